//! Session-related data models.
//!
//! Only closed sessions are persisted; an open session lives in
//! `tracker::SessionRegistry` until it is closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub file_id: i64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    /// Whole seconds between open and close.
    pub duration: u64,
}

/// Row counts plus sessions that point at files no longer in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReport {
    pub file_count: u64,
    pub session_count: u64,
    pub orphan_file_ids: Vec<i64>,
}

impl StoreReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_file_ids.is_empty()
    }
}
