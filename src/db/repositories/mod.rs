pub mod files;
pub mod sessions;
