//! Read-only retrieval over an immutable index snapshot.
//!
//! The service holds an `Arc` to the current snapshot behind an RwLock.
//! Queries clone the Arc and score against it lock-free, so a snapshot swap
//! never disturbs an in-flight query: it drains against the snapshot it
//! started with.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::domain::Principle;
use crate::error::{GovernError, GovernResult};
use crate::index::{Embedder, IndexSnapshot};

/// One ranked principle hit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedPrinciple {
    pub principle: Principle,
    /// Cosine similarity against the query.
    pub score: f32,
}

/// One ranked domain hit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedDomain {
    pub name: String,
    pub score: f32,
}

/// Serves similarity queries against the current snapshot.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl RetrievalService {
    /// Create a service over a validated snapshot.
    pub fn new(embedder: Arc<dyn Embedder>, snapshot: IndexSnapshot) -> GovernResult<Self> {
        snapshot.validate(embedder.as_ref())?;
        Ok(Self {
            embedder,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The snapshot currently being served.
    pub async fn current(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Atomically install a rebuilt snapshot. In-flight queries keep the
    /// Arc they already cloned and drain naturally.
    pub async fn swap(&self, snapshot: IndexSnapshot) -> GovernResult<()> {
        snapshot.validate(self.embedder.as_ref())?;
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(snapshot);
        tracing::info!("Retrieval snapshot swapped");
        Ok(())
    }

    /// Rank principles by similarity to the query text.
    ///
    /// Ordering is deterministic: score descending, then lower domain
    /// priority, then lexicographic id.
    pub async fn rank_principles(
        &self,
        query_text: &str,
        top_k: usize,
        domain_filter: Option<&str>,
    ) -> GovernResult<Vec<RankedPrinciple>> {
        let snapshot = self.current().await;
        let query = self
            .embedder
            .embed(query_text)
            .map_err(|e| GovernError::BadRequest(format!("query cannot be embedded: {}", e)))?;

        let mut hits: Vec<RankedPrinciple> = snapshot
            .principles
            .iter()
            .filter(|p| domain_filter.map_or(true, |d| p.domain == d))
            .filter_map(|p| {
                snapshot.principle_vectors.get(&p.id).map(|v| RankedPrinciple {
                    principle: p.clone(),
                    score: query.cosine(v),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    snapshot
                        .domain_priority(&a.principle.domain)
                        .cmp(&snapshot.domain_priority(&b.principle.domain))
                })
                .then_with(|| a.principle.id.cmp(&b.principle.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Rank domains by similarity to the query text, for callers that do
    /// not already know which jurisdiction applies.
    pub async fn route_domain(&self, query_text: &str) -> GovernResult<Vec<RankedDomain>> {
        let snapshot = self.current().await;
        let query = self
            .embedder
            .embed(query_text)
            .map_err(|e| GovernError::BadRequest(format!("query cannot be embedded: {}", e)))?;

        let mut hits: Vec<RankedDomain> = snapshot
            .domains
            .iter()
            .filter_map(|d| {
                snapshot.domain_vectors.get(&d.name).map(|v| RankedDomain {
                    name: d.name.clone(),
                    score: query.cosine(v),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    snapshot
                        .domain_priority(&a.name)
                        .cmp(&snapshot.domain_priority(&b.name))
                })
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainSpec;
    use crate::index::{HashingEmbedder, IndexBuilder};

    fn domain(name: &str, prefix: &str, description: &str, priority: u32) -> DomainSpec {
        DomainSpec {
            name: name.to_string(),
            prefix: prefix.to_string(),
            description: description.to_string(),
            priority,
            documents: vec![],
        }
    }

    fn service() -> RetrievalService {
        let embedder = Arc::new(HashingEmbedder::default());
        let domains = vec![
            domain(
                "ai-coding",
                "coding",
                "Principles governing specifications, reviews and implementation of software",
                10,
            ),
            domain(
                "meta",
                "meta",
                "Cross-cutting safety and escalation principles for agent conduct",
                1,
            ),
        ];
        let principles = vec![
            Principle::new(
                "coding",
                "ai-coding",
                "context",
                "Specification Completeness",
                "Definition: how do I validate that my specification is complete? \
                 Check every requirement is stated before implementation.",
            ),
            Principle::new(
                "coding",
                "ai-coding",
                "process",
                "Review Rigor",
                "Definition: every change is reviewed by a second pair of eyes.",
            ),
            Principle::new(
                "meta",
                "meta",
                "safety",
                "Non-Maleficence",
                "Definition: never expose credentials or take harmful actions.",
            ),
        ];

        let builder = IndexBuilder::new(embedder.clone());
        let snapshot = builder.build(&domains, principles).unwrap();
        RetrievalService::new(embedder, snapshot).unwrap()
    }

    #[tokio::test]
    async fn test_own_text_ranks_first() {
        let service = service();
        let snapshot = service.current().await;
        let target = snapshot
            .principle("coding-context-specification-completeness")
            .unwrap()
            .clone();

        let hits = service
            .rank_principles(&target.embedding_text(), 3, Some("ai-coding"))
            .await
            .unwrap();

        assert_eq!(hits[0].principle.id, target.id);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_specification_query_returns_top_one() {
        let service = service();
        let hits = service
            .rank_principles("how do I validate that my specification is complete?", 3, None)
            .await
            .unwrap();

        assert_eq!(
            hits[0].principle.id,
            "coding-context-specification-completeness"
        );
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_domain_filter_restricts_candidates() {
        let service = service();
        let hits = service
            .rank_principles("expose credentials", 10, Some("ai-coding"))
            .await
            .unwrap();

        assert!(hits.iter().all(|h| h.principle.domain == "ai-coding"));
    }

    #[tokio::test]
    async fn test_tie_break_is_deterministic() {
        // Two principles with identical text in different domains produce
        // identical scores; the lower-priority-value domain must win.
        let embedder = Arc::new(HashingEmbedder::default());
        let domains = vec![
            domain("ai-coding", "coding", "software principles", 10),
            domain("meta", "meta", "cross-cutting principles", 1),
        ];
        let principles = vec![
            Principle::new("coding", "ai-coding", "process", "Shared Title", "Definition: same."),
            Principle::new("meta", "meta", "process", "Shared Title", "Definition: same."),
        ];
        let snapshot = IndexBuilder::new(embedder.clone())
            .build(&domains, principles)
            .unwrap();
        let service = RetrievalService::new(embedder, snapshot).unwrap();

        let hits = service
            .rank_principles("Shared Title Definition: same.", 2, None)
            .await
            .unwrap();

        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(hits[0].principle.domain, "meta");
        assert_eq!(hits[1].principle.domain, "ai-coding");
    }

    #[tokio::test]
    async fn test_route_domain_orders_by_similarity() {
        let service = service();
        let routed = service
            .route_domain("is my software specification reviewed and implemented correctly")
            .await
            .unwrap();

        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0].name, "ai-coding");
    }

    #[tokio::test]
    async fn test_swap_does_not_disturb_inflight_snapshot() {
        let service = service();
        let held = service.current().await;
        let held_count = held.principles.len();

        // Rebuild with fewer principles and swap it in.
        let embedder = Arc::new(HashingEmbedder::default());
        let domains = vec![domain("meta", "meta", "cross-cutting principles", 1)];
        let principles = vec![Principle::new(
            "meta",
            "meta",
            "safety",
            "Non-Maleficence",
            "Definition: do no harm.",
        )];
        let replacement = IndexBuilder::new(embedder)
            .build(&domains, principles)
            .unwrap();
        service.swap(replacement).await.unwrap();

        // The held Arc still serves the old snapshot; new reads see the new one.
        assert_eq!(held.principles.len(), held_count);
        assert_eq!(service.current().await.principles.len(), 1);
    }

    #[tokio::test]
    async fn test_unembeddable_query_is_bad_request() {
        let service = service();
        let err = service.rank_principles("...", 3, None).await.unwrap_err();
        assert!(matches!(err, GovernError::BadRequest(_)));
    }
}
