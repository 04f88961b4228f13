use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_cluster, parse_datetime, to_i64, to_u64},
    models::{Cluster, FileRecord},
};

const FILE_COLUMNS: &str =
    "id, path, access_count, total_time, last_opened, cluster_id, cluster_label, searchable_text";

fn row_to_file(row: &Row) -> Result<FileRecord> {
    let access_count: i64 = row.get("access_count")?;
    let total_time: i64 = row.get("total_time")?;
    let last_opened: String = row.get("last_opened")?;
    let cluster_id: Option<i64> = row.get("cluster_id")?;
    let cluster_label: Option<String> = row.get("cluster_label")?;

    Ok(FileRecord {
        id: row.get("id")?,
        path: row.get("path")?,
        access_count: to_u64(access_count, "access_count")?,
        total_time: to_u64(total_time, "total_time")?,
        last_opened: parse_datetime(&last_opened, "last_opened")?,
        cluster: parse_cluster(cluster_id, cluster_label)?,
        searchable_text: row.get("searchable_text")?,
    })
}

fn query_files(conn: &Connection, sql: &str) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut files = Vec::new();
    while let Some(row) = rows.next()? {
        files.push(row_to_file(row)?);
    }
    Ok(files)
}

fn find_by_path(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"))?;
    let mut rows = stmt.query(params![path])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_file(row)?)),
        None => Ok(None),
    }
}

/// Close-of-session bookkeeping on the file row.
pub(crate) fn bump_usage(
    conn: &Connection,
    file_id: i64,
    duration: u64,
    closed_at: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE files
         SET access_count = access_count + 1,
             total_time = total_time + ?1,
             last_opened = ?2
         WHERE id = ?3",
        params![to_i64(duration)?, closed_at.to_rfc3339(), file_id],
    )?;
    if changed == 0 {
        log::warn!("Session closed for file {file_id} which is no longer tracked");
    }
    Ok(())
}

impl Database {
    /// Insert a newly sighted file. When the path is already tracked the
    /// existing row is returned untouched; the flag reports which happened.
    pub async fn insert_file(
        &self,
        path: &str,
        searchable_text: String,
    ) -> Result<(FileRecord, bool)> {
        let path = path.to_string();
        self.execute(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO files (path, access_count, total_time, last_opened, searchable_text)
                     VALUES (?1, 0, 0, ?2, ?3)
                     ON CONFLICT(path) DO NOTHING",
                    params![path, Utc::now().to_rfc3339(), searchable_text],
                )
                .with_context(|| format!("failed to insert file {path}"))?;

            let record = find_by_path(conn, &path)?
                .with_context(|| format!("file {path} missing after insert"))?;
            Ok((record, inserted > 0))
        })
        .await
    }

    pub async fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let path = path.to_string();
        self.execute(move |conn| find_by_path(conn, &path)).await
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.execute(|conn| {
            query_files(
                conn,
                &format!("SELECT {FILE_COLUMNS} FROM files ORDER BY id ASC"),
            )
        })
        .await
    }

    /// Files with non-empty searchable text, in identifier order.
    pub async fn list_indexable_files(&self) -> Result<Vec<FileRecord>> {
        self.execute(|conn| {
            query_files(
                conn,
                &format!(
                    "SELECT {FILE_COLUMNS} FROM files
                     WHERE searchable_text IS NOT NULL AND TRIM(searchable_text) != ''
                     ORDER BY id ASC"
                ),
            )
        })
        .await
    }

    pub async fn list_clustered_files(&self) -> Result<Vec<FileRecord>> {
        self.execute(|conn| {
            query_files(
                conn,
                &format!(
                    "SELECT {FILE_COLUMNS} FROM files
                     WHERE cluster_label IS NOT NULL
                     ORDER BY cluster_label ASC, path ASC"
                ),
            )
        })
        .await
    }

    pub async fn count_clustered_files(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM files WHERE cluster_label IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            to_u64(count, "clustered count")
        })
        .await
    }

    /// Write a full clustering pass in one transaction.
    pub async fn update_clusters(&self, updates: Vec<(i64, Option<Cluster>)>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open cluster transaction")?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "UPDATE files SET cluster_id = ?1, cluster_label = ?2 WHERE id = ?3",
                )?;
                for (file_id, cluster) in &updates {
                    written += stmt.execute(params![
                        cluster.map(|c| c.id),
                        cluster.map(|c| c.label.as_str()),
                        file_id,
                    ])?;
                }
            }
            tx.commit().context("failed to commit cluster assignments")?;
            Ok(written)
        })
        .await
    }

    pub async fn update_searchable_text(&self, file_id: i64, text: String) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE files SET searchable_text = ?1 WHERE id = ?2",
                params![text, file_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Remove a tracked file and its session history. Returns false when the
    /// path was not tracked.
    pub async fn delete_file(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let file_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM files WHERE path = ?1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(file_id) = file_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM sessions WHERE file_id = ?1", params![file_id])?;
            tx.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
            tx.commit().context("failed to commit file deletion")?;
            Ok(true)
        })
        .await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch("DELETE FROM sessions; DELETE FROM files;")
                .context("failed to clear store")?;
            Ok(())
        })
        .await
    }
}
