pub mod classify;
pub mod context;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod tests;

pub use classify::{Classification, classify, fingerprint, normalize_message};
pub use stats::{ErrorStatistics, ErrorSummary, TrendBucket};
pub use store::ErrorStore;
pub use types::*;
