//! Deterministic text embedder.
//!
//! Feature-hashing bag of words: each token is hashed with SHA-256 into a
//! fixed-dimension bucket with a sign bit, and the accumulated vector is
//! L2-normalized. SHA-256 keeps the mapping stable across processes and
//! platforms, which is what makes index rebuilds reproducible.

use sha2::{Digest, Sha256};

use crate::index::{EmbedError, EmbeddingVector};

/// Default embedding dimensionality.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Computes embeddings for index builds and for queries. Implementations
/// must be deterministic: the same text always yields the same vector.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the snapshot so loads can detect mismatches.
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError>;
}

/// Feature-hashing bag-of-words embedder.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-bow-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let mut values = vec![0.0f32; self.dimensions];
        let mut token_count = 0usize;

        for token in Self::tokens(text) {
            token_count += 1;
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_be_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }

        if token_count == 0 {
            return Err(EmbedError::NoTokens);
        }

        let magnitude = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude == 0.0 {
            // Signs cancelled out entirely; nothing to rank against.
            return Err(EmbedError::NoTokens);
        }
        for v in &mut values {
            *v /= magnitude;
        }

        EmbeddingVector::new(values)
    }
}
