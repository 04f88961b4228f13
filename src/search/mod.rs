//! Semantic retrieval over tracked documents.
//!
//! - `embedder`: the `Embedder` seam and backend selection
//! - `hash_embedder`: FNV-1a feature hashing, deterministic and offline
//! - `fastembed_embedder`: all-MiniLM-L6-v2 (feature `semantic-model`)
//! - `cosine`: vector similarity
//! - `cache`: the persisted, incrementally extended embedding cache
//! - `index`: `SemanticIndex`, the handle callers hold for sync and search
//! - `policy`: caller-side thresholding and extension boosting

pub mod cache;
pub mod cosine;
pub mod embedder;
#[cfg(feature = "semantic-model")]
mod fastembed_embedder;
pub mod hash_embedder;
pub mod index;
pub mod policy;

pub use cache::{CacheArtifacts, EmbeddingCache, SyncOutcome};
pub use embedder::{build_embedder, EmbedError, Embedder, EmbedderKind};
#[cfg(feature = "semantic-model")]
pub use fastembed_embedder::FastEmbedEmbedder;
pub use hash_embedder::{HashEmbedder, DEFAULT_HASH_DIMENSION};
pub use index::{IndexSnapshot, SearchHit, SemanticIndex, SyncReport};
pub use policy::{extension_query, SearchPolicy};
