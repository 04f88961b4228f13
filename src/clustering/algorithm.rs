use std::path::Path;

use serde::Serialize;

use crate::clustering::keywords::label_for;
use crate::db::models::{Cluster, ClusterLabel, FileRecord};
use crate::extract::is_document_path;
use crate::log_info;

const ENABLE_LOGS: bool = true;

/// Every labelled file currently lands in one bucket; the id only marks that
/// the label came from this pass.
pub const DEFAULT_CLUSTER_ID: i64 = 0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssignment {
    pub file_id: i64,
    pub path: String,
    /// `None` means unclustered.
    pub cluster: Option<Cluster>,
}

impl ClusterAssignment {
    pub fn label(&self) -> Option<ClusterLabel> {
        self.cluster.map(|c| c.label)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    /// One entry per input file, in input order. Empty when nothing was
    /// eligible.
    pub assignments: Vec<ClusterAssignment>,
    /// Number of eligible documents that received a label.
    pub processed: usize,
}

impl ClusterReport {
    pub fn updates(&self) -> Vec<(i64, Option<Cluster>)> {
        self.assignments
            .iter()
            .map(|a| (a.file_id, a.cluster))
            .collect()
    }

    pub fn count(&self, label: ClusterLabel) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.label() == Some(label))
            .count()
    }
}

/// Filename stem, lower-cased, `_`/`-` to spaces, digits removed.
pub fn normalize_filename(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();

    let cleaned: String = stem
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();

    cleaned.trim().to_string()
}

/// Label every document by filename keywords; everything else is cleared.
pub fn cluster(files: &[FileRecord]) -> ClusterReport {
    let eligible = files.iter().filter(|f| is_document_path(&f.path)).count();
    if eligible == 0 {
        log_info!("Clustering skipped: no eligible documents among {} files", files.len());
        return ClusterReport::default();
    }

    let assignments: Vec<ClusterAssignment> = files
        .iter()
        .map(|file| {
            let cluster = is_document_path(&file.path).then(|| Cluster {
                id: DEFAULT_CLUSTER_ID,
                label: label_for(&normalize_filename(&file.path)),
            });
            ClusterAssignment {
                file_id: file.id,
                path: file.path.clone(),
                cluster,
            }
        })
        .collect();

    let report = ClusterReport {
        assignments,
        processed: eligible,
    };

    log_info!(
        "Clustered {} documents (Study {}, Work {}, Personal {}), {} files left unclustered",
        report.processed,
        report.count(ClusterLabel::Study),
        report.count(ClusterLabel::Work),
        report.count(ClusterLabel::Personal),
        files.len() - eligible
    );

    report
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn files(paths: &[&str]) -> Vec<FileRecord> {
        paths
            .iter()
            .enumerate()
            .map(|(i, path)| FileRecord {
                id: i as i64 + 1,
                path: path.to_string(),
                access_count: 0,
                total_time: 0,
                last_opened: Utc::now(),
                cluster: Some(Cluster {
                    id: 3,
                    label: ClusterLabel::Personal,
                }),
                searchable_text: None,
            })
            .collect()
    }

    fn labels(report: &ClusterReport) -> Vec<Option<ClusterLabel>> {
        report.assignments.iter().map(|a| a.label()).collect()
    }

    #[test]
    fn normalizes_filenames() {
        assert_eq!(normalize_filename("/a/OS_Assignment-12.pdf"), "os assignment");
        assert_eq!(normalize_filename("2024_invoice_march.docx"), "invoice march");
        assert_eq!(normalize_filename("123.txt"), "");
    }

    #[test]
    fn labels_documents_and_clears_everything_else() {
        let report = cluster(&files(&[
            "os_assignment_1.pdf",
            "invoice_march.docx",
            "vacation.jpg",
        ]));

        assert_eq!(
            labels(&report),
            vec![Some(ClusterLabel::Study), Some(ClusterLabel::Work), None]
        );
        assert_eq!(report.processed, 2);
        assert!(report
            .assignments
            .iter()
            .filter_map(|a| a.cluster)
            .all(|c| c.id == DEFAULT_CLUSTER_ID));
    }

    #[test]
    fn unmatched_documents_are_personal() {
        let report = cluster(&files(&["/home/me/Recipes.TXT", "budget.xlsx"]));
        assert_eq!(
            labels(&report),
            vec![Some(ClusterLabel::Personal), Some(ClusterLabel::Personal)]
        );
    }

    #[test]
    fn no_eligible_files_is_a_no_op() {
        let report = cluster(&files(&["song.mp3", "photo.png"]));
        assert_eq!(report.processed, 0);
        assert!(report.assignments.is_empty());
        assert!(cluster(&[]).assignments.is_empty());
    }

    #[test]
    fn clustering_is_deterministic() {
        let input = files(&["exam_notes.pdf", "salary_slip.pdf", "beach_photo.jpg"]);
        assert_eq!(cluster(&input).assignments, cluster(&input).assignments);
        assert_eq!(
            labels(&cluster(&input)),
            vec![Some(ClusterLabel::Study), Some(ClusterLabel::Work), None]
        );
    }
}
