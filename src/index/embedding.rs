//! Dense embedding vectors and cosine similarity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from embedding construction or computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbedError {
    #[error("embedding vector must not be empty")]
    Empty,

    #[error("embedding vector contains non-finite values")]
    NonFinite,

    #[error("text produced no tokens to embed")]
    NoTokens,
}

/// An immutable dense vector. Computed once at index-build time and never
/// mutated afterwards.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    /// Create an embedding from owned values, rejecting empty or
    /// non-finite input.
    pub fn new(values: Vec<f32>) -> Result<Self, EmbedError> {
        if values.is_empty() {
            return Err(EmbedError::Empty);
        }
        if !values.iter().all(|v| v.is_finite()) {
            return Err(EmbedError::NonFinite);
        }
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false in practice, since construction rejects empty input.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn dot(&self, other: &Self) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    fn magnitude(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity with another vector; 0.0 when either is degenerate.
    pub fn cosine(&self, other: &Self) -> f32 {
        let denominator = self.magnitude() * other.magnitude();
        if denominator == 0.0 {
            0.0
        } else {
            self.dot(other) / denominator
        }
    }
}

impl std::fmt::Debug for EmbeddingVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("dimensions", &self.len())
            .finish()
    }
}

impl Serialize for EmbeddingVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmbeddingVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Self::new(values).map_err(serde::de::Error::custom)
    }
}
