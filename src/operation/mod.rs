pub mod store;
pub mod tracker;
pub mod types;


pub use store::OperationStore;
pub use tracker::{Failure, OperationTracker, ProgressHandle, SeverityCounts};
pub use types::*;
