pub mod controller;
pub mod registry;

pub use controller::SessionTracker;
pub use registry::{OpenSession, SessionRegistry};
