pub mod cli;
pub mod clustering;
pub mod db;
pub mod extract;
pub mod ranking;
pub mod search;
pub mod settings;
pub mod tracker;
pub mod utils;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::task;

use clustering::{cluster, ClusterReport};
use db::{ClusterLabel, Database, FileRecord, StoreReport};
use extract::get_searchable_text;
use ranking::{rank, RankedFile};
use search::{build_embedder, SearchHit, SemanticIndex, SyncReport};
use settings::SettingsStore;
use tracker::SessionTracker;

const ENABLE_LOGS: bool = true;

pub const DB_FILE: &str = "file_logs.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Everything a front end needs, rooted at one data directory.
pub struct AppState {
    pub db: Database,
    pub tracker: SessionTracker,
    pub settings: SettingsStore,
    data_dir: PathBuf,
}

impl AppState {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DB_FILE))?;
        let settings_path = data_dir.join(SETTINGS_FILE);
        let first_run = !settings_path.exists();
        let settings = SettingsStore::new(settings_path)?;
        if first_run {
            // Write the defaults out so they can be edited by hand.
            settings.update(|_| {})?;
        }

        Ok(Self {
            tracker: SessionTracker::new(db.clone()),
            db,
            settings,
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the configured embedder and whatever cache exists on disk.
    pub fn open_index(&self) -> Result<Arc<SemanticIndex>> {
        let settings = self.settings.get();
        let embedder = build_embedder(settings.embedder, settings.hash_dimension)?;
        log_info!("Using {} embeddings ({} dimensions)", embedder.name(), embedder.dimension());
        Ok(Arc::new(SemanticIndex::open(&self.data_dir, embedder)))
    }

    pub async fn add_file(&self, path: &str) -> Result<FileRecord> {
        self.tracker.ensure_file(path).await
    }

    pub async fn remove_file(&self, path: &str) -> Result<bool> {
        let removed = self.db.delete_file(path).await?;
        if removed {
            log_info!("Stopped tracking {path}");
        }
        Ok(removed)
    }

    pub async fn rank_files(&self, limit: Option<usize>) -> Result<Vec<RankedFile>> {
        let files = self.db.list_files().await?;
        let weights = self.settings.get().ranking;
        let mut ranked = rank(&files, Utc::now(), &weights);
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }
        Ok(ranked)
    }

    /// Label every tracked file and persist the result in one transaction.
    pub async fn cluster_files(&self) -> Result<ClusterReport> {
        let files = self.db.list_files().await?;
        let report = cluster(&files);
        if !report.assignments.is_empty() {
            self.db.update_clusters(report.updates()).await?;
        }
        Ok(report)
    }

    /// Clustered files by label. Clusters first when nothing is labelled yet.
    pub async fn grouped_files(&self) -> Result<BTreeMap<ClusterLabel, Vec<FileRecord>>> {
        if self.db.count_clustered_files().await? == 0 {
            self.cluster_files().await?;
        }

        let mut groups: BTreeMap<ClusterLabel, Vec<FileRecord>> = BTreeMap::new();
        for file in self.db.list_clustered_files().await? {
            if let Some(label) = file.cluster_label() {
                groups.entry(label).or_default().push(file);
            }
        }
        Ok(groups)
    }

    pub async fn sync_index(&self, index: &Arc<SemanticIndex>) -> Result<SyncReport> {
        let files = self.db.list_indexable_files().await?;
        let index = Arc::clone(index);
        let report = task::spawn_blocking(move || index.sync(&files))
            .await
            .context("index sync task panicked")??;

        log_info!(
            "Index version {}: {} new embeddings, {} total",
            report.version,
            report.embedded,
            report.total
        );
        Ok(report)
    }

    /// Sync, then search with the configured policy.
    pub async fn search(
        &self,
        index: &Arc<SemanticIndex>,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim().to_string();
        if query.is_empty() {
            bail!("search query must not be empty");
        }

        self.sync_index(index).await?;

        let mut policy = self.settings.get().search;
        if let Some(top_k) = top_k {
            policy.top_k = top_k;
        }

        let index = Arc::clone(index);
        let hits = task::spawn_blocking(move || index.query(&query, &policy))
            .await
            .context("search task panicked")??;
        Ok(hits)
    }

    /// Re-extract searchable text for every file. Returns how many changed.
    /// Existing embeddings are not recomputed.
    pub async fn refresh_searchable_text(&self) -> Result<usize> {
        let mut changed = 0;
        for file in self.db.list_files().await? {
            let path = file.path.clone();
            let text = task::spawn_blocking(move || get_searchable_text(&path))
                .await
                .context("text extraction task panicked")?;

            if file.searchable_text.as_deref() != Some(text.as_str()) {
                self.db.update_searchable_text(file.id, text).await?;
                changed += 1;
            }
        }
        log_info!("Refreshed searchable text for {changed} files");
        Ok(changed)
    }

    pub async fn check(&self) -> Result<StoreReport> {
        self.db.store_report().await
    }

    pub async fn reset(&self) -> Result<()> {
        self.db.clear_all().await?;
        log_info!("Cleared all files and sessions");
        Ok(())
    }
}

pub fn run() -> Result<()> {
    // RUST_LOG wins when set; otherwise info and above.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(cli::execute(args))
}
