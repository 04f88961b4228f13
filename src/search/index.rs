use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, RwLock},
};

use anyhow::Result;
use serde::Serialize;

use crate::db::models::FileRecord;
use crate::search::cache::EmbeddingCache;
use crate::search::cosine::cosine_similarity;
use crate::search::embedder::{EmbedError, Embedder};
use crate::search::policy::SearchPolicy;
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub file_id: i64,
    pub path: String,
    pub score: f64,
}

/// One consistent view of the cache. Never mutated after publication; a sync
/// builds a new snapshot and swaps it in.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    pub version: u64,
    pub ids: Vec<i64>,
    pub vectors: Vec<Vec<f32>>,
    /// Paths of the records the snapshot was synced against. Cached ids
    /// missing here are stale.
    pub paths: HashMap<i64, String>,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn stale_count(&self) -> usize {
        self.ids
            .iter()
            .filter(|id| !self.paths.contains_key(*id))
            .count()
    }

    fn rank(&self, query_vector: &[f32], top_k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .filter_map(|(id, vector)| {
                let path = self.paths.get(id)?;
                Some(SearchHit {
                    file_id: *id,
                    path: path.clone(),
                    score: cosine_similarity(query_vector, vector),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub embedded: usize,
    pub total: usize,
    pub version: u64,
    pub rebuilt: bool,
}

/// Owns the embedding model and the cache for one data directory.
///
/// Syncs are serialised by an internal lock. Searches read whatever snapshot
/// is current and never block on a running sync.
pub struct SemanticIndex {
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
    mutation: Mutex<()>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl SemanticIndex {
    /// Load whatever cache exists. Until the first `sync` no record paths are
    /// known, so searches return nothing.
    pub fn open(data_dir: &Path, embedder: Arc<dyn Embedder>) -> Self {
        let cache = EmbeddingCache::new(data_dir);
        let snapshot = match cache.load_usable(embedder.as_ref()) {
            Some(artifacts) => IndexSnapshot {
                version: 0,
                ids: artifacts.ids,
                vectors: artifacts.vectors,
                paths: HashMap::new(),
            },
            None => IndexSnapshot::default(),
        };

        Self {
            embedder,
            cache,
            mutation: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// `open` followed by `sync`.
    pub fn build(
        data_dir: &Path,
        embedder: Arc<dyn Embedder>,
        files: &[FileRecord],
    ) -> Result<Self> {
        let index = Self::open(data_dir, embedder);
        index.sync(files)?;
        Ok(index)
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Embed whatever `files` the cache lacks and publish a new snapshot.
    /// On failure the previous snapshot and the files on disk are unchanged.
    pub fn sync(&self, files: &[FileRecord]) -> Result<SyncReport> {
        let _mutation = self
            .mutation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let outcome = self.cache.sync(files, self.embedder.as_ref())?;
        let version = self.snapshot().version + 1;

        let paths = files
            .iter()
            .map(|file| (file.id, file.path.clone()))
            .collect();
        let snapshot = IndexSnapshot {
            version,
            ids: outcome.artifacts.ids,
            vectors: outcome.artifacts.vectors,
            paths,
        };
        let report = SyncReport {
            embedded: outcome.embedded,
            total: snapshot.len(),
            version,
            rebuilt: outcome.rebuilt,
        };

        let stale = snapshot.stale_count();
        if stale > 0 {
            log_info!("{stale} cached embeddings belong to files no longer tracked");
        }

        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);

        Ok(report)
    }

    /// Raw similarity search: best `top_k` hits, highest first, ties in cache
    /// order.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, EmbedError> {
        if query.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let snapshot = self.snapshot();
        if snapshot.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let hits = snapshot.rank(&query_vector, top_k);
        log_debug!(
            "Query {query:?} against snapshot v{}: {} hits from {} vectors",
            snapshot.version,
            hits.len(),
            snapshot.len()
        );
        Ok(hits)
    }

    /// Search with `policy` applied to a single similarity pass.
    pub fn query(&self, query: &str, policy: &SearchPolicy) -> Result<Vec<SearchHit>, EmbedError> {
        let hits = self.search(query, policy.top_k)?;
        Ok(policy.apply(query, hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::search::cache::tests::{doc, CountingEmbedder};
    use crate::search::hash_embedder::HashEmbedder;

    /// Maps text to a fixed vector by the first key it contains.
    struct TableEmbedder {
        table: Vec<(&'static str, [f32; 3])>,
    }

    impl TableEmbedder {
        fn new() -> Self {
            Self {
                table: vec![
                    ("report", [0.2, 1.0, 0.0]),
                    ("exam", [0.0, 1.0, 0.0]),
                    ("todo", [0.9, 0.1, 0.0]),
                    ("data", [-0.5, 1.0, 0.0]),
                    ("pdf", [1.0, 0.0, 0.0]),
                ],
            }
        }
    }

    impl Embedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        fn dimension(&self) -> usize {
            3
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|text| {
                    self.table
                        .iter()
                        .find(|(key, _)| text.contains(key))
                        .map(|(_, v)| v.to_vec())
                        .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
                })
                .collect())
        }
    }

    fn table_index(dir: &Path) -> SemanticIndex {
        let files = vec![
            doc(1, "/d/todo.txt", "todo txt"),
            doc(2, "/d/report.pdf", "report pdf"),
            doc(3, "/d/exam.pdf", "exam pdf"),
            doc(4, "/d/data.csv", "data csv"),
        ];
        SemanticIndex::build(dir, Arc::new(TableEmbedder::new()), &files).unwrap()
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.path.as_str()).collect()
    }

    #[test]
    fn raw_search_orders_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let index = table_index(dir.path());

        let hits = index.search("pdf", 10).unwrap();
        assert_eq!(
            paths(&hits),
            vec!["/d/todo.txt", "/d/report.pdf", "/d/exam.pdf", "/d/data.csv"]
        );
        assert_eq!(
            paths(&index.search("pdf", 2).unwrap()),
            vec!["/d/todo.txt", "/d/report.pdf"]
        );
    }

    #[test]
    fn extension_query_ranks_matching_files_above_closer_ones() {
        let dir = tempfile::tempdir().unwrap();
        let index = table_index(dir.path());

        let hits = index.query("pdf", &SearchPolicy::default()).unwrap();
        assert_eq!(paths(&hits), vec!["/d/report.pdf", "/d/exam.pdf", "/d/todo.txt"]);
    }

    #[test]
    fn weak_matches_are_filtered_to_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let index = table_index(dir.path());

        let hits = index.query("holiday", &SearchPolicy::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_query_is_rejected_and_empty_index_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = SemanticIndex::open(dir.path(), Arc::new(HashEmbedder::default()));

        assert!(matches!(index.search("   ", 5), Err(EmbedError::EmptyInput)));
        assert!(index.search("exam", 5).unwrap().is_empty());
    }

    #[test]
    fn stale_ids_are_skipped_before_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let index = table_index(dir.path());

        let remaining = vec![
            doc(2, "/d/report.pdf", "report pdf"),
            doc(3, "/d/exam.pdf", "exam pdf"),
        ];
        let report = index.sync(&remaining).unwrap();
        assert_eq!(report.embedded, 0);
        assert_eq!(report.total, 4);

        let hits = index.search("pdf", 1).unwrap();
        assert_eq!(paths(&hits), vec!["/d/report.pdf"]);
    }

    #[test]
    fn sync_publishes_new_snapshots_without_touching_old_ones() {
        let dir = tempfile::tempdir().unwrap();
        let index = SemanticIndex::open(dir.path(), Arc::new(HashEmbedder::default()));
        let before = index.snapshot();

        let report = index.sync(&[doc(1, "/d/exam_notes.pdf", "exam notes pdf")]).unwrap();
        assert_eq!(report.version, before.version + 1);
        assert!(before.is_empty());
        assert_eq!(index.snapshot().len(), 1);
    }

    #[test]
    fn concurrent_syncs_embed_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder::new());
        let index = SemanticIndex::open(dir.path(), embedder.clone());
        let files: Vec<FileRecord> = (1..=8)
            .map(|id| doc(id, &format!("/d/notes_{id}.txt"), &format!("notes {id} txt")))
            .collect();

        let (shared, batch) = (&index, &files);
        let reports: Vec<SyncReport> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..2)
                .map(|_| scope.spawn(move || shared.sync(batch).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let embedded: usize = reports.iter().map(|r| r.embedded).sum();
        assert_eq!(embedded, files.len());
        assert_eq!(embedder.texts.load(Ordering::SeqCst), files.len());

        let snapshot = index.snapshot();
        assert_eq!(snapshot.ids.len(), snapshot.vectors.len());
        assert_eq!(snapshot.len(), files.len());
        assert_eq!(snapshot.version, 2);

        let reloaded = EmbeddingCache::new(dir.path())
            .load(embedder.as_ref())
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.ids, snapshot.ids);
    }

    #[test]
    fn reopening_reuses_the_persisted_cache() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![doc(1, "/d/exam_notes.pdf", "exam notes pdf")];
        SemanticIndex::build(dir.path(), Arc::new(HashEmbedder::default()), &files).unwrap();

        let reopened = SemanticIndex::open(dir.path(), Arc::new(HashEmbedder::default()));
        assert_eq!(reopened.snapshot().len(), 1);
        let report = reopened.sync(&files).unwrap();
        assert_eq!(report.embedded, 0);
        assert!(!report.rebuilt);
        assert_eq!(reopened.search("exam", 5).unwrap()[0].file_id, 1);
    }
}
