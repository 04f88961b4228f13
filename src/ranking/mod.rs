pub mod config;
pub mod scoring;

pub use config::RankingWeights;
pub use scoring::{rank, PriorityTier, RankedFile};
