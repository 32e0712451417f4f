//! The persisted, immutable index artifact.
//!
//! A snapshot is written as a whole and swapped as a whole; consumers never
//! observe a partially-built one. Persistence goes through a temp file and
//! a rename so a crashed write cannot corrupt the published artifact.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainSpec, Principle};
use crate::error::{GovernError, GovernResult};
use crate::index::{Embedder, EmbeddingVector};

/// Identifies the embedder a snapshot was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderInfo {
    pub name: String,
    pub dimensions: usize,
}

/// The immutable artifact produced by one index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub built_at: DateTime<Utc>,
    pub embedder: EmbedderInfo,
    pub domains: Vec<DomainSpec>,
    /// Principles in ingestion order.
    pub principles: Vec<Principle>,
    /// Principle id -> embedding. BTreeMap keeps serialization stable.
    pub principle_vectors: BTreeMap<String, EmbeddingVector>,
    /// Domain name -> routing embedding.
    pub domain_vectors: BTreeMap<String, EmbeddingVector>,
}

impl IndexSnapshot {
    pub fn principle(&self, id: &str) -> Option<&Principle> {
        self.principles.iter().find(|p| p.id == id)
    }

    pub fn domain(&self, name: &str) -> Option<&DomainSpec> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Priority of a principle's owning domain; unknown domains rank last.
    pub fn domain_priority(&self, name: &str) -> u32 {
        self.domain(name).map(|d| d.priority).unwrap_or(u32::MAX)
    }

    /// Check the snapshot is internally consistent and matches the given
    /// embedder. Run on every load; failures are fatal at startup.
    pub fn validate(&self, embedder: &dyn Embedder) -> GovernResult<()> {
        if self.embedder.name != embedder.name() || self.embedder.dimensions != embedder.dimensions()
        {
            return Err(GovernError::IndexLoad(format!(
                "snapshot built with embedder {}/{} but serving embedder is {}/{}",
                self.embedder.name,
                self.embedder.dimensions,
                embedder.name(),
                embedder.dimensions()
            )));
        }

        for principle in &self.principles {
            match self.principle_vectors.get(&principle.id) {
                Some(v) if v.len() == self.embedder.dimensions => {}
                Some(_) => {
                    return Err(GovernError::IndexLoad(format!(
                        "principle '{}' has a vector of the wrong dimension",
                        principle.id
                    )))
                }
                None => {
                    return Err(GovernError::IndexLoad(format!(
                        "principle '{}' has no embedding in the snapshot",
                        principle.id
                    )))
                }
            }
        }

        for domain in &self.domains {
            if !self.domain_vectors.contains_key(&domain.name) {
                return Err(GovernError::IndexLoad(format!(
                    "domain '{}' has no routing embedding in the snapshot",
                    domain.name
                )));
            }
        }

        Ok(())
    }

    /// Persist the snapshot atomically: write a sibling temp file, then
    /// rename over the destination.
    pub fn save(&self, path: impl AsRef<Path>) -> GovernResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    GovernError::Internal(format!(
                        "cannot create snapshot directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).map_err(|e| {
            GovernError::Internal(format!("cannot write snapshot {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            GovernError::Internal(format!("cannot publish snapshot {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            principles = self.principles.len(),
            domains = self.domains.len(),
            "Index snapshot persisted"
        );
        Ok(())
    }

    /// Load a snapshot from disk. Missing or corrupt files are
    /// [`GovernError::IndexLoad`].
    pub fn load(path: impl AsRef<Path>) -> GovernResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            GovernError::IndexLoad(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            GovernError::IndexLoad(format!("snapshot {} is corrupt: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HashingEmbedder;

    fn sample_snapshot() -> IndexSnapshot {
        let embedder = HashingEmbedder::new(32);
        let principle = Principle::new(
            "coding",
            "ai-coding",
            "context",
            "Specification Completeness",
            "Definition: every requirement is stated.",
        );
        let domain = DomainSpec {
            name: "ai-coding".to_string(),
            prefix: "coding".to_string(),
            description: "AI-assisted software work".to_string(),
            priority: 10,
            documents: vec![],
        };

        let mut principle_vectors = BTreeMap::new();
        principle_vectors.insert(
            principle.id.clone(),
            embedder.embed(&principle.embedding_text()).unwrap(),
        );
        let mut domain_vectors = BTreeMap::new();
        domain_vectors.insert(
            domain.name.clone(),
            embedder.embed(&domain.description).unwrap(),
        );

        IndexSnapshot {
            built_at: Utc::now(),
            embedder: EmbedderInfo {
                name: embedder.name().to_string(),
                dimensions: embedder.dimensions(),
            },
            domains: vec![domain],
            principles: vec![principle],
            principle_vectors,
            domain_vectors,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("govern-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let snapshot = sample_snapshot();
        let path = temp_path("roundtrip");

        snapshot.save(&path).unwrap();
        let loaded = IndexSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_is_index_load_failure() {
        let err = IndexSnapshot::load("/nonexistent/snapshot.json").unwrap_err();
        assert!(matches!(err, GovernError::IndexLoad(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_load_corrupt_is_index_load_failure() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{ not valid json").unwrap();

        let err = IndexSnapshot::load(&path).unwrap_err();
        assert!(matches!(err, GovernError::IndexLoad(_)));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_validate_detects_embedder_mismatch() {
        let snapshot = sample_snapshot();
        let other = HashingEmbedder::new(64);
        let err = snapshot.validate(&other).unwrap_err();
        assert!(matches!(err, GovernError::IndexLoad(_)));
    }

    #[test]
    fn test_validate_detects_missing_vector() {
        let mut snapshot = sample_snapshot();
        snapshot.principle_vectors.clear();
        let embedder = HashingEmbedder::new(32);
        let err = snapshot.validate(&embedder).unwrap_err();
        assert!(matches!(err, GovernError::IndexLoad(_)));
    }

    #[test]
    fn test_validate_accepts_consistent_snapshot() {
        let snapshot = sample_snapshot();
        let embedder = HashingEmbedder::new(32);
        assert!(snapshot.validate(&embedder).is_ok());
    }
}
