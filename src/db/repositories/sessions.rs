use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::{SessionRecord, StoreReport},
    repositories::files::bump_usage,
};

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let open_time: String = row.get("open_time")?;
    let close_time: String = row.get("close_time")?;
    let duration: i64 = row.get("duration")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        file_id: row.get("file_id")?,
        open_time: parse_datetime(&open_time, "open_time")?,
        close_time: parse_datetime(&close_time, "close_time")?,
        duration: to_u64(duration, "duration")?,
    })
}

impl Database {
    /// Persist a closed session and credit its duration to the file, atomically.
    pub async fn record_session(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open session transaction")?;
            tx.execute(
                "INSERT INTO sessions (id, file_id, open_time, close_time, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.file_id,
                    record.open_time.to_rfc3339(),
                    record.close_time.to_rfc3339(),
                    to_i64(record.duration)?,
                ],
            )
            .with_context(|| "failed to insert session")?;
            bump_usage(&tx, record.file_id, record.duration, record.close_time)?;
            tx.commit().context("failed to commit session")?;
            Ok(())
        })
        .await
    }

    pub async fn list_sessions_for_file(&self, file_id: i64) -> Result<Vec<SessionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, file_id, open_time, close_time, duration
                 FROM sessions
                 WHERE file_id = ?1
                 ORDER BY open_time ASC",
            )?;

            let mut rows = stmt.query(params![file_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Row counts and any sessions whose file row has disappeared.
    pub async fn store_report(&self) -> Result<StoreReport> {
        self.execute(|conn| {
            let file_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
            let session_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

            let mut stmt = conn.prepare(
                "SELECT DISTINCT s.file_id
                 FROM sessions s
                 LEFT JOIN files f ON s.file_id = f.id
                 WHERE f.id IS NULL
                 ORDER BY s.file_id ASC",
            )?;
            let orphan_file_ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(StoreReport {
                file_count: to_u64(file_count, "file count")?,
                session_count: to_u64(session_count, "session count")?,
                orphan_file_ids,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::db::models::{Cluster, ClusterLabel};

    fn open_store() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        (dir, db)
    }

    fn session_for(file_id: i64, duration: u64) -> SessionRecord {
        let close_time = Utc::now();
        SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id,
            open_time: close_time - Duration::seconds(duration as i64),
            close_time,
            duration,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_path() {
        let (_dir, db) = open_store();
        let (first, inserted) = db.insert_file("/docs/a.pdf", "a pdf".into()).await.unwrap();
        assert!(inserted);
        let (second, inserted) = db.insert_file("/docs/a.pdf", "changed".into()).await.unwrap();
        assert!(!inserted);
        assert_eq!(first.id, second.id);
        assert_eq!(second.searchable_text.as_deref(), Some("a pdf"));
    }

    #[tokio::test]
    async fn identifiers_are_not_reused_after_delete() {
        let (_dir, db) = open_store();
        let (a, _) = db.insert_file("/docs/a.pdf", "a pdf".into()).await.unwrap();
        assert!(db.delete_file("/docs/a.pdf").await.unwrap());
        let (b, _) = db.insert_file("/docs/b.pdf", "b pdf".into()).await.unwrap();
        assert!(b.id > a.id);
        assert!(!db.delete_file("/docs/a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn recording_a_session_updates_counters() {
        let (_dir, db) = open_store();
        let (file, _) = db.insert_file("/docs/a.pdf", "a pdf".into()).await.unwrap();

        db.record_session(&session_for(file.id, 30)).await.unwrap();
        db.record_session(&session_for(file.id, 12)).await.unwrap();

        let updated = db.get_file_by_path("/docs/a.pdf").await.unwrap().unwrap();
        assert_eq!(updated.access_count, 2);
        assert_eq!(updated.total_time, 42);
        assert_eq!(db.list_sessions_for_file(file.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cluster_updates_round_trip_and_clear() {
        let (_dir, db) = open_store();
        let (a, _) = db.insert_file("/docs/a.pdf", "a pdf".into()).await.unwrap();
        let (b, _) = db.insert_file("/docs/b.jpg", String::new()).await.unwrap();
        let study = Cluster {
            id: 0,
            label: ClusterLabel::Study,
        };

        let written = db
            .update_clusters(vec![(a.id, Some(study)), (b.id, None)])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let clustered = db.list_clustered_files().await.unwrap();
        assert_eq!(clustered.len(), 1);
        assert_eq!(clustered[0].cluster, Some(study));
        assert_eq!(db.count_clustered_files().await.unwrap(), 1);

        let indexable = db.list_indexable_files().await.unwrap();
        assert_eq!(indexable.len(), 1);
        assert_eq!(indexable[0].id, a.id);
    }

    #[tokio::test]
    async fn report_flags_orphan_sessions() {
        let (_dir, db) = open_store();
        db.record_session(&session_for(99, 5)).await.unwrap();

        let report = db.store_report().await.unwrap();
        assert_eq!(report.file_count, 0);
        assert_eq!(report.session_count, 1);
        assert_eq!(report.orphan_file_ids, vec![99]);
        assert!(!report.is_consistent());

        db.clear_all().await.unwrap();
        assert!(db.store_report().await.unwrap().is_consistent());
    }
}
