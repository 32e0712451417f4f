//! Governance Decision Engine
//!
//! Ingests structured policy documents into addressable principles, builds
//! a semantic index over them, and evaluates proposed agent actions through
//! a deterministic safety gate plus an external judgment capability,
//! producing an auditable, enforceable verdict for every action.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

mod api;
mod audit;
mod config;
mod domain;
mod engine;
mod error;
mod index;
mod ingest;
mod logging;
mod retrieval;

use crate::api::build_router;
use crate::audit::AuditLog;
use crate::config::Config;
use crate::domain::{DomainSpec, Principle};
use crate::engine::{
    EnforcementGateway, EvaluationOrchestrator, HttpJudgmentClient, HttpToolForwarder,
    JudgmentCapability, PatternSafetyGate, UnavailableJudgment,
};
use crate::error::{GovernError, GovernResult};
use crate::index::{HashingEmbedder, IndexBuilder, IndexSnapshot};
use crate::ingest::parse_document_file;
use crate::retrieval::RetrievalService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The evaluation orchestrator.
    pub orchestrator: Arc<EvaluationOrchestrator>,
    /// Enforcement gateway, present in gateway deployments only.
    pub gateway: Option<Arc<EnforcementGateway>>,
    /// Retrieval service over the current snapshot.
    pub retrieval: Arc<RetrievalService>,
    /// Audit log repository.
    pub audit: AuditLog,
    /// Where the snapshot artifact lives on disk, for operator reloads.
    pub snapshot_path: String,
}

#[derive(Parser)]
#[command(
    name = "govern-core",
    version,
    about = "Governance Decision Engine - evaluates AI agent actions against indexed policy principles"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every registered document and rebuild the index snapshot
    RebuildIndex,
    /// Load the snapshot and answer a canned query as a sanity check
    VerifyIndex,
    /// Start the evaluation server
    RunServer,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize logging
    logging::init();

    tracing::info!("Governance Decision Engine v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let result = match load_config() {
        Ok(config) => match cli.command {
            Command::RebuildIndex => rebuild_index(&config),
            Command::VerifyIndex => verify_index(&config).await,
            Command::RunServer => run_server(config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(e.exit_code());
    }
}

fn load_config() -> GovernResult<Config> {
    Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        GovernError::Config(e.to_string())
    })
}

/// Ingest all registered documents and publish a fresh snapshot.
fn rebuild_index(config: &Config) -> GovernResult<()> {
    if config.domains.is_empty() {
        return Err(GovernError::Config(
            "no domains registered; nothing to index".to_string(),
        ));
    }

    let domains: Vec<DomainSpec> = config.domains.iter().map(DomainSpec::from).collect();
    let mut principles: Vec<Principle> = Vec::new();
    let mut total_warnings = 0usize;
    let mut total_skipped = 0usize;

    for domain in &config.domains {
        for document in &domain.documents {
            let report = parse_document_file(document, &domain.prefix, &domain.name)?;

            for warning in &report.warnings {
                tracing::warn!(document = %document, warning = %warning, "Ingestion warning");
            }
            total_warnings += report.warnings.len();
            total_skipped += report.skipped_blocks;

            tracing::info!(
                document = %document,
                domain = %domain.name,
                principles = report.principles.len(),
                skipped_blocks = report.skipped_blocks,
                "Document ingested"
            );

            // Cross-document collisions within a domain follow the same
            // later-wins rule as collisions inside one document.
            for principle in report.principles {
                if let Some(existing) = principles.iter_mut().find(|p| p.id == principle.id) {
                    tracing::warn!(id = %principle.id, "Duplicate principle id across documents, later occurrence kept");
                    total_warnings += 1;
                    *existing = principle;
                } else {
                    principles.push(principle);
                }
            }
        }
    }

    let embedder = Arc::new(HashingEmbedder::new(config.index.dimensions));
    let builder = IndexBuilder::new(embedder);
    let snapshot = builder.build(&domains, principles)?;
    snapshot.save(&config.index.snapshot_path)?;

    tracing::info!(
        snapshot = %config.index.snapshot_path,
        principles = snapshot.principles.len(),
        domains = snapshot.domains.len(),
        warnings = total_warnings,
        skipped_blocks = total_skipped,
        "Index rebuild complete"
    );
    Ok(())
}

/// Sanity-check that the snapshot loads and answers a canned query.
async fn verify_index(config: &Config) -> GovernResult<()> {
    let embedder = Arc::new(HashingEmbedder::new(config.index.dimensions));
    let snapshot = IndexSnapshot::load(&config.index.snapshot_path)?;
    let service = RetrievalService::new(embedder, snapshot)?;

    let hits = service
        .rank_principles("governance policy principles", 1, None)
        .await?;

    match hits.first() {
        Some(hit) => tracing::info!(
            top_hit = %hit.principle.id,
            score = hit.score,
            "Index verified"
        ),
        None => tracing::warn!("Index verified but contains no principles"),
    }
    Ok(())
}

/// Load the snapshot, connect storage, and serve until shutdown.
async fn run_server(config: Config) -> GovernResult<()> {
    // Synchronous index load before accepting any requests; a missing or
    // corrupt snapshot refuses startup.
    let embedder = Arc::new(HashingEmbedder::new(config.index.dimensions));
    let snapshot = IndexSnapshot::load(&config.index.snapshot_path)?;
    tracing::info!(
        built_at = %snapshot.built_at,
        principles = snapshot.principles.len(),
        "Index snapshot loaded"
    );
    let retrieval = Arc::new(RetrievalService::new(embedder, snapshot)?);

    // Connect to database
    let pool = SqlitePool::connect(&config.audit.database_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            GovernError::Internal(format!("database connection error: {}", e))
        })?;

    let audit = AuditLog::new(pool, config.audit.max_retries);
    audit.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        e
    })?;
    tracing::info!("Database connected and schema initialized");

    // Safety gate: built-in patterns plus deployment extras. There is no
    // configuration that disables it.
    let gate = Box::new(PatternSafetyGate::new(config.safety.extra_patterns.clone()));

    // Judgment capability: injected collaborator, or a fail-closed stand-in.
    let judgment: Box<dyn JudgmentCapability> = if config.judgment.enabled {
        tracing::info!(
            endpoint = %config.judgment.endpoint,
            model = %config.judgment.model,
            "External judgment capability enabled"
        );
        Box::new(HttpJudgmentClient::new(&config.judgment)?)
    } else {
        tracing::warn!("No judgment capability configured - non-escalated actions will escalate");
        Box::new(UnavailableJudgment)
    };

    let orchestrator = Arc::new(EvaluationOrchestrator::new(
        gate,
        retrieval.clone(),
        judgment,
        audit.clone(),
        config.index.top_k,
        Duration::from_secs(config.judgment.timeout_secs),
    ));

    // Enforcement gateway, when this deployment intercepts rather than advises.
    let gateway = if config.gateway.enabled {
        tracing::info!(
            downstream = %config.gateway.downstream_url,
            "Enforcement gateway enabled"
        );
        let forwarder = Box::new(HttpToolForwarder::new(&config.gateway)?);
        Some(Arc::new(EnforcementGateway::new(
            orchestrator.clone(),
            forwarder,
            audit.clone(),
        )))
    } else {
        tracing::info!("Advisory mode - callers are trusted to honor assessments");
        None
    };

    let state = AppState {
        orchestrator,
        gateway,
        retrieval,
        audit,
        snapshot_path: config.index.snapshot_path.clone(),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GovernError::Internal(format!("cannot bind {}: {}", addr, e)))?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    // Graceful shutdown lets in-flight audit writes complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GovernError::Internal(format!("server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
