use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::hash_embedder::HashEmbedder;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Text to fixed-dimension vector. Cache and queries must share one instance
/// (or at least one model) for scores to mean anything.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbedError::Unavailable(format!("{} returned no vector", self.name())))?;
        check_dimension(self.dimension(), &vector)?;
        Ok(vector)
    }
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbedError> {
    if vector.len() != expected {
        return Err(EmbedError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Feature hashing over word tokens. No model download; the offline
    /// fallback when the crate is built without `semantic-model`.
    Hash,
    /// all-MiniLM-L6-v2 sentence embeddings.
    Minilm,
}

impl Default for EmbedderKind {
    fn default() -> Self {
        if cfg!(feature = "semantic-model") {
            Self::Minilm
        } else {
            Self::Hash
        }
    }
}

pub fn build_embedder(
    kind: EmbedderKind,
    hash_dimension: usize,
) -> Result<Arc<dyn Embedder>, EmbedError> {
    match kind {
        EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(hash_dimension)?)),
        EmbedderKind::Minilm => build_minilm(),
    }
}

#[cfg(feature = "semantic-model")]
fn build_minilm() -> Result<Arc<dyn Embedder>, EmbedError> {
    Ok(Arc::new(crate::search::FastEmbedEmbedder::new()?))
}

#[cfg(not(feature = "semantic-model"))]
fn build_minilm() -> Result<Arc<dyn Embedder>, EmbedError> {
    Err(EmbedError::Unavailable(
        "all-MiniLM-L6-v2 requires building with the `semantic-model` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_backend_is_always_available() {
        let embedder = build_embedder(EmbedderKind::Hash, 64).unwrap();
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.embed("exam notes").unwrap().len(), 64);
    }

    #[test]
    fn empty_text_is_rejected_before_embedding() {
        let embedder = build_embedder(EmbedderKind::Hash, 64).unwrap();
        assert!(matches!(embedder.embed("  "), Err(EmbedError::EmptyInput)));
    }

    #[test]
    fn default_kind_follows_the_model_feature() {
        let expected = if cfg!(feature = "semantic-model") {
            EmbedderKind::Minilm
        } else {
            EmbedderKind::Hash
        };
        assert_eq!(EmbedderKind::default(), expected);
    }

    #[cfg(not(feature = "semantic-model"))]
    #[test]
    fn minilm_without_feature_is_unavailable() {
        assert!(matches!(
            build_embedder(EmbedderKind::Minilm, 384),
            Err(EmbedError::Unavailable(_))
        ));
    }
}
