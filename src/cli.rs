use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ranking::RankedFile;
use crate::search::SearchHit;
use crate::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "fileorg",
    version,
    about = "Track which files you use, rank them, group them and search them by meaning"
)]
pub struct Cli {
    /// Directory holding the record store, embedding cache and settings
    #[arg(long, global = true, env = "FILEORG_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start tracking a file without opening a session
    Add { path: PathBuf },
    /// Open a session for a file and close it when Enter is pressed
    Open { path: PathBuf },
    /// Files by usage priority
    Rank {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Label documents as Study, Work or Personal
    Cluster,
    /// Clustered files grouped by label
    Groups,
    /// Embed files that are not in the search cache yet
    Index,
    /// Semantic search over tracked documents
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Stop tracking a file. The file on disk is left alone
    Remove { path: PathBuf },
    /// Re-extract searchable text for every tracked file
    RefreshText,
    /// Report row counts and sessions pointing at missing files
    Check,
    /// Delete every tracked file and session
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

pub async fn execute(cli: Cli) -> Result<()> {
    let state = AppState::open(&cli.data_dir)?;
    let json = cli.json;

    match cli.command {
        Commands::Add { path } => {
            let record = state.add_file(&resolve_path(&path)?).await?;
            emit(json, &record, || println!("Tracking {} (id {})", record.path, record.id))?;
        }
        Commands::Open { path } => {
            let path = resolve_path(&path)?;
            state.tracker.open(&path).await?;
            println!("Opened {path}. Press Enter to close it.");

            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("failed to read from stdin")?;

            if let Some(session) = state.tracker.close(&path).await? {
                emit(json, &session, || {
                    println!("Closed {path} after {}s", session.duration)
                })?;
            }
        }
        Commands::Rank { limit } => {
            let ranked = state.rank_files(limit).await?;
            emit(json, &ranked, || print_ranking(&ranked))?;
        }
        Commands::Cluster => {
            let report = state.cluster_files().await?;
            emit(json, &report, || {
                if report.processed == 0 {
                    println!("No documents to cluster.");
                } else {
                    println!("Clustered {} documents.", report.processed);
                }
            })?;
        }
        Commands::Groups => {
            let groups = state.grouped_files().await?;
            emit(json, &groups, || {
                if groups.is_empty() {
                    println!("No clustered files yet.");
                }
                for (label, files) in &groups {
                    println!("{label} ({})", files.len());
                    for file in files {
                        println!("  {:<32} {}", file.file_name(), file.path);
                    }
                }
            })?;
        }
        Commands::Index => {
            let index = state.open_index()?;
            let report = state.sync_index(&index).await?;
            emit(json, &report, || {
                println!(
                    "Embedded {} new files; {} in the index.",
                    report.embedded, report.total
                )
            })?;
        }
        Commands::Search { query, top_k } => {
            let index = state.open_index()?;
            let hits = state.search(&index, &query, top_k).await?;
            emit(json, &hits, || print_hits(&hits))?;
        }
        Commands::Remove { path } => {
            let path = resolve_path(&path)?;
            if state.remove_file(&path).await? {
                println!("Removed {path}");
            } else {
                println!("{path} is not tracked");
            }
        }
        Commands::RefreshText => {
            let changed = state.refresh_searchable_text().await?;
            println!("Updated searchable text for {changed} files");
        }
        Commands::Check => {
            let report = state.check().await?;
            emit(json, &report, || {
                println!("Files:    {}", report.file_count);
                println!("Sessions: {}", report.session_count);
                if report.is_consistent() {
                    println!("No orphan sessions.");
                } else {
                    for file_id in &report.orphan_file_ids {
                        println!("Orphan sessions for file id {file_id}");
                    }
                }
            })?;
        }
        Commands::Reset { yes } => {
            if !yes {
                println!("This deletes every tracked file and session. Re-run with --yes to confirm.");
                return Ok(());
            }
            state.reset().await?;
            println!("Cleared all records.");
        }
    }

    Ok(())
}

/// Absolute form of `path`, so the same file is always stored under one key.
fn resolve_path(path: &Path) -> Result<String> {
    let resolved = match std::fs::canonicalize(path) {
        Ok(canonical) => canonical,
        Err(_) if path.is_absolute() => path.to_path_buf(),
        Err(_) => std::env::current_dir()
            .context("failed to read current directory")?
            .join(path),
    };
    Ok(resolved.to_string_lossy().into_owned())
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn print_ranking(ranked: &[RankedFile]) {
    if ranked.is_empty() {
        println!("No files tracked yet.");
        return;
    }
    for (position, entry) in ranked.iter().enumerate() {
        println!(
            "{:>3}. {:.4} {:<9} {:>4} opens {:>6}s  {}",
            position + 1,
            entry.score,
            entry.tier.as_str(),
            entry.file.access_count,
            entry.file.total_time,
            entry.file.path
        );
    }
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No relevant results found.");
        return;
    }
    for hit in hits {
        println!("{:.3}  {}", hit.score, hit.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fileorg",
            "search",
            "exam notes",
            "--top-k",
            "5",
            "--data-dir",
            "/tmp/x",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Search { query, top_k } => {
                assert_eq!(query, "exam notes");
                assert_eq!(top_k, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn reset_requires_no_arguments() {
        let cli = Cli::try_parse_from(["fileorg", "reset"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { yes: false }));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let resolved = resolve_path(Path::new("does/not/exist.pdf")).unwrap();
        assert!(Path::new(&resolved).is_absolute());
        assert!(resolved.ends_with("exist.pdf"));
    }
}
