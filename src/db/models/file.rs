//! Tracked-file data models.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topical group assigned by the clustering pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterLabel {
    Study,
    Work,
    Personal,
}

impl ClusterLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterLabel::Study => "Study",
            ClusterLabel::Work => "Work",
            ClusterLabel::Personal => "Personal",
        }
    }
}

impl std::fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `cluster_id` and `cluster_label` travel together: a file is either
/// clustered (both set) or unclustered (`None` on the record).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: i64,
    pub label: ClusterLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub access_count: u64,
    /// Cumulative open time in whole seconds.
    pub total_time: u64,
    pub last_opened: DateTime<Utc>,
    pub cluster: Option<Cluster>,
    pub searchable_text: Option<String>,
}

impl FileRecord {
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }

    pub fn has_searchable_text(&self) -> bool {
        self.searchable_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    pub fn cluster_label(&self) -> Option<ClusterLabel> {
        self.cluster.map(|cluster| cluster.label)
    }
}

/// Lower-cased extension without the leading dot.
pub fn file_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
