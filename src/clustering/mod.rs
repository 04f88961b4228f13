pub mod algorithm;
pub mod keywords;

pub use algorithm::{
    cluster, normalize_filename, ClusterAssignment, ClusterReport, DEFAULT_CLUSTER_ID,
};
pub use keywords::{label_for, KeywordScore};
