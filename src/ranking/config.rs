use serde::{Deserialize, Serialize};

/// Weights for the priority score. Each factor lies in [0, 1], so with the
/// defaults the score does too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingWeights {
    /// Share of opens relative to the most-opened file.
    pub access: f64,
    /// Share of cumulative open time relative to the longest-used file.
    pub time: f64,
    /// `1 / (seconds since last open + 1)`.
    pub recency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            access: 0.4,
            time: 0.4,
            recency: 0.2,
        }
    }
}
