use std::convert::TryFrom;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{Cluster, ClusterLabel};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_label(value: &str) -> Result<ClusterLabel> {
    match value {
        "Study" => Ok(ClusterLabel::Study),
        "Work" => Ok(ClusterLabel::Work),
        "Personal" => Ok(ClusterLabel::Personal),
        other => Err(anyhow!("unknown cluster label {other}")),
    }
}

/// Rebuild the paired cluster columns; a half-set pair is a corrupt row.
pub fn parse_cluster(id: Option<i64>, label: Option<String>) -> Result<Option<Cluster>> {
    match (id, label) {
        (Some(id), Some(label)) => Ok(Some(Cluster {
            id,
            label: parse_label(&label)?,
        })),
        (None, None) => Ok(None),
        (id, label) => bail!("cluster columns out of sync (id {id:?}, label {label:?})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_pair_must_be_complete() {
        assert_eq!(parse_cluster(None, None).unwrap(), None);
        assert_eq!(
            parse_cluster(Some(0), Some("Work".into())).unwrap(),
            Some(Cluster {
                id: 0,
                label: ClusterLabel::Work
            })
        );
        assert!(parse_cluster(Some(0), None).is_err());
        assert!(parse_cluster(None, Some("Study".into())).is_err());
        assert!(parse_cluster(Some(0), Some("Music".into())).is_err());
    }

    #[test]
    fn negative_counters_are_rejected() {
        assert_eq!(to_u64(3, "access_count").unwrap(), 3);
        assert!(to_u64(-1, "access_count").is_err());
    }
}
