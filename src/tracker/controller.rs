use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::{sync::Mutex, task};
use uuid::Uuid;

use crate::{
    db::{Database, FileRecord, SessionRecord},
    extract::get_searchable_text,
    log_info, log_warn,
};

use super::SessionRegistry;

const ENABLE_LOGS: bool = true;

/// Turns open/close events into persisted sessions and usage counters.
#[derive(Clone)]
pub struct SessionTracker {
    registry: Arc<Mutex<SessionRegistry>>,
    db: Database,
}

impl SessionTracker {
    pub fn new(db: Database) -> Self {
        Self {
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            db,
        }
    }

    /// Return the record for `path`, creating it on first sighting.
    /// Extraction runs off the async runtime since `pdftotext` can be slow.
    pub async fn ensure_file(&self, path: &str) -> Result<FileRecord> {
        if let Some(existing) = self.db.get_file_by_path(path).await? {
            return Ok(existing);
        }

        let owned = path.to_string();
        let text = task::spawn_blocking(move || get_searchable_text(&owned))
            .await
            .context("text extraction task panicked")?;

        let (record, inserted) = self.db.insert_file(path, text).await?;
        if inserted {
            log_info!("Tracking new file {} (id {})", record.path, record.id);
        }
        Ok(record)
    }

    pub async fn open(&self, path: &str) -> Result<FileRecord> {
        let record = self.ensure_file(path).await?;

        let replaced = self
            .registry
            .lock()
            .await
            .begin(path, record.id, Utc::now(), Instant::now());
        if replaced.is_some() {
            log_warn!("{path} was already open; restarting its session");
        }

        log_info!("Opened {path}");
        Ok(record)
    }

    /// Close the session for `path`. `None` when nothing was open there.
    pub async fn close(&self, path: &str) -> Result<Option<SessionRecord>> {
        let Some(open) = self.registry.lock().await.end(path) else {
            return Ok(None);
        };

        let session = SessionRecord {
            id: Uuid::new_v4().to_string(),
            file_id: open.file_id,
            open_time: open.started_at,
            close_time: Utc::now(),
            duration: open.elapsed_secs(Instant::now()),
        };

        self.db
            .record_session(&session)
            .await
            .with_context(|| format!("failed to record session for {path}"))?;

        log_info!("Closed {path} after {}s", session.duration);
        Ok(Some(session))
    }

    pub async fn is_open(&self, path: &str) -> bool {
        self.registry.lock().await.is_open(path)
    }

    pub async fn open_paths(&self) -> Vec<String> {
        self.registry.lock().await.paths()
    }
}
