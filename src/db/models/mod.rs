pub mod file;
pub mod session;

pub use file::{file_extension, Cluster, ClusterLabel, FileRecord};
pub use session::{SessionRecord, StoreReport};
