//! Full, from-scratch index builds.
//!
//! No incremental mode: partial updates risk index/document drift, so every
//! rebuild recomputes everything and either succeeds whole or fails whole.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{DomainSpec, Principle};
use crate::error::{GovernError, GovernResult};
use crate::index::{Embedder, EmbedderInfo, IndexSnapshot};

/// Builds [`IndexSnapshot`]s from ingested principles and the domain
/// registry. Idempotent: identical input yields snapshots identical in
/// every field except `built_at`.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Build a snapshot, embedding every principle and every domain.
    ///
    /// If anything fails to embed, the whole build aborts with a diagnostic
    /// listing every failure; no partial snapshot is produced.
    pub fn build(
        &self,
        domains: &[DomainSpec],
        principles: Vec<Principle>,
    ) -> GovernResult<IndexSnapshot> {
        let mut failures = Vec::new();
        let mut principle_vectors = BTreeMap::new();
        let mut domain_vectors = BTreeMap::new();

        for principle in &principles {
            match self.embedder.embed(&principle.embedding_text()) {
                Ok(vector) => {
                    principle_vectors.insert(principle.id.clone(), vector);
                }
                Err(e) => failures.push(format!("principle '{}': {}", principle.id, e)),
            }
        }

        for domain in domains {
            match self.embedder.embed(&domain.description) {
                Ok(vector) => {
                    domain_vectors.insert(domain.name.clone(), vector);
                }
                Err(e) => failures.push(format!("domain '{}': {}", domain.name, e)),
            }
        }

        if !failures.is_empty() {
            tracing::error!(failures = failures.len(), "Index build aborted");
            return Err(GovernError::Build { failures });
        }

        let snapshot = IndexSnapshot {
            built_at: Utc::now(),
            embedder: EmbedderInfo {
                name: self.embedder.name().to_string(),
                dimensions: self.embedder.dimensions(),
            },
            domains: domains.to_vec(),
            principles,
            principle_vectors,
            domain_vectors,
        };

        tracing::info!(
            principles = snapshot.principles.len(),
            domains = snapshot.domains.len(),
            "Index build complete"
        );
        Ok(snapshot)
    }
}
