use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::FileRecord;
use crate::ranking::config::RankingWeights;

/// Display bucket for a priority score.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PriorityTier {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            PriorityTier::VeryHigh
        } else if score >= 0.5 {
            PriorityTier::High
        } else if score >= 0.25 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::VeryHigh => "very high",
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFile {
    pub file: FileRecord,
    pub score: f64,
    pub access_norm: f64,
    pub time_norm: f64,
    pub recency_score: f64,
    pub tier: PriorityTier,
}

/// Order files by usage priority, highest first.
///
/// Ties keep the input order. `now` is explicit so the same snapshot always
/// ranks the same way.
pub fn rank(files: &[FileRecord], now: DateTime<Utc>, weights: &RankingWeights) -> Vec<RankedFile> {
    if files.is_empty() {
        return Vec::new();
    }

    let max_access = files.iter().map(|f| f.access_count).max().unwrap_or(0);
    let max_time = files.iter().map(|f| f.total_time).max().unwrap_or(0);

    let mut ranked: Vec<RankedFile> = files
        .iter()
        .map(|file| {
            let access_norm = normalize(file.access_count, max_access);
            let time_norm = normalize(file.total_time, max_time);
            let recency_score = score_recency(file.last_opened, now);

            let score = round4(
                weights.access * access_norm
                    + weights.time * time_norm
                    + weights.recency * recency_score,
            );

            RankedFile {
                file: file.clone(),
                score,
                access_norm,
                time_norm,
                recency_score,
                tier: PriorityTier::from_score(score),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

fn normalize(value: u64, max_value: u64) -> f64 {
    if max_value == 0 {
        return 0.0;
    }
    value as f64 / max_value as f64
}

/// `1 / (age + 1)` with the age in fractional seconds. A timestamp in the
/// future (clock skew) counts as age zero.
fn score_recency(last_opened: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_secs = (now - last_opened).num_milliseconds().max(0) as f64 / 1000.0;
    1.0 / (age_secs + 1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
