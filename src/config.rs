//! Configuration module for the Governance Decision Engine.
//!
//! Loads configuration from YAML files and environment variables,
//! including the domain registry that drives ingestion and routing.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub audit: AuditConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub judgment: JudgmentConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Domain registry: one entry per policy jurisdiction.
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub database_url: String,
    /// Append retries before the write failure escalates as an incident.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

/// Index build and serving configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Where the snapshot artifact is persisted.
    pub snapshot_path: String,
    /// Embedding dimensionality for the hashing embedder.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// How many principles to hand to the judgment capability.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_dimensions() -> usize {
    256
}

fn default_top_k() -> usize {
    5
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "data/index-snapshot.json".to_string(),
            dimensions: default_dimensions(),
            top_k: default_top_k(),
        }
    }
}

/// Safety gate configuration.
///
/// The built-in pattern set cannot be disabled; this only adds to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetyConfig {
    /// Deployment-specific patterns appended to the built-in set.
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

/// External judgment capability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgmentConfig {
    /// Whether an external judgment endpoint is configured.
    /// When false, every non-escalated action still escalates (fail-closed).
    pub enabled: bool,
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Timeout applied to the judgment call; on expiry the action escalates.
    pub timeout_secs: u64,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: 15,
        }
    }
}

/// Enforcement gateway configuration.
///
/// When disabled the engine runs in advisory mode: callers receive an
/// assessment and are trusted to honor it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    pub enabled: bool,
    /// Downstream tool endpoint that approved requests are forwarded to.
    #[serde(default)]
    pub downstream_url: String,
    #[serde(default = "default_forward_timeout")]
    pub timeout_secs: u64,
}

fn default_forward_timeout() -> u64 {
    30
}

/// One registered policy domain.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    /// Display name, e.g. "ai-coding".
    pub name: String,
    /// Short id prefix, e.g. "coding".
    pub prefix: String,
    /// Free text used to compute the routing embedding.
    pub description: String,
    /// Lower value = more authoritative; used as a ranking tie-break.
    pub priority: u32,
    /// Source documents ingested for this domain.
    #[serde(default)]
    pub documents: Vec<String>,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (GOVERN_*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default config
            .add_source(File::with_name("config/default").required(false))
            // Layer on local overrides
            .add_source(File::with_name("config/local").required(false))
            // Layer on environment variables with GOVERN_ prefix
            .add_source(
                Environment::with_prefix("GOVERN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
