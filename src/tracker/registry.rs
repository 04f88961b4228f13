use std::{collections::HashMap, time::Instant};

use chrono::{DateTime, Utc};

/// A file that is currently open. Lives only in memory; a crash loses it.
#[derive(Debug, Clone)]
pub struct OpenSession {
    pub file_id: i64,
    pub started_at: DateTime<Utc>,
    /// Monotonic start, so wall-clock jumps do not skew the duration.
    anchor: Instant,
}

impl OpenSession {
    /// Whole seconds between the start and `now`.
    pub fn elapsed_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.anchor).as_secs()
    }
}

/// Open sessions keyed by file path.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    open: HashMap<String, OpenSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `path`. Returns the session it replaced, if the
    /// path was already open.
    pub fn begin(
        &mut self,
        path: &str,
        file_id: i64,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Option<OpenSession> {
        self.open.insert(
            path.to_string(),
            OpenSession {
                file_id,
                started_at,
                anchor: now,
            },
        )
    }

    pub fn end(&mut self, path: &str) -> Option<OpenSession> {
        self.open.remove(path)
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.open.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.open.keys().cloned().collect();
        paths.sort();
        paths
    }
}
