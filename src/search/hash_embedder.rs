//! FNV-1a feature hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed into one of `dimension`
//! buckets with a hash-derived sign, then the vector is L2-normalised. Texts
//! sharing words get positive cosine similarity; there is no notion of
//! synonyms. Deterministic across runs and platforms.

use crate::search::embedder::{EmbedError, Embedder};

pub const DEFAULT_HASH_DIMENSION: usize = 384;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::Unavailable(
                "hash embedder dimension must be positive".into(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "fnv1a-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
