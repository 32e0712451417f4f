//! Domain records: named policy jurisdictions used for routing.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::DomainConfig;

/// A routing target and jurisdiction. Every principle belongs to exactly
/// one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DomainSpec {
    /// Display name, e.g. "ai-coding".
    pub name: String,

    /// Short abbreviation used as the id prefix, e.g. "coding".
    pub prefix: String,

    /// Free text from which the routing embedding is computed.
    pub description: String,

    /// Lower value = more authoritative; ranking tie-break.
    pub priority: u32,

    /// Source document references for this domain's principles.
    pub documents: Vec<String>,
}

impl From<&DomainConfig> for DomainSpec {
    fn from(config: &DomainConfig) -> Self {
        Self {
            name: config.name.clone(),
            prefix: config.prefix.clone(),
            description: config.description.clone(),
            priority: config.priority,
            documents: config.documents.clone(),
        }
    }
}
