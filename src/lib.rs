//! # Flightdeck
//!
//! Real-time visibility into in-flight asynchronous work and failures
//! inside an interactive application. Flightdeck tracks the lifecycle of
//! concurrent operations (external calls, file actions, build steps, tool
//! executions, model requests), aggregates their progress, and maintains a
//! deduplicated, classified, self-healing record of errors.
//!
//! ## Architecture Overview
//!
//! The crate is organized around two cooperating subsystems plus the glue
//! that composes them:
//!
//! - **[`operation`]**: operation entity store, lifecycle tracker, and the
//!   `track` convenience wrapper that runs a unit of work and records its
//!   outcome
//! - **[`errors`]**: bounded error store with fingerprint deduplication,
//!   deterministic classification, recurring-pattern detection, and timed
//!   auto-resolution of low-severity entries
//! - **[`metrics`]**: the abstracted sink used for best-effort dashboard
//!   persistence
//! - **[`system`]**: the [`Monitor`](system::Monitor) service instance
//!   wiring everything together
//!
//! ## Features
//!
//! ### 🎯 Operation Tracking
//! - **Lifecycle State Machine**: `pending -> running -> {completed, error,
//!   cancelled}`; terminal states are frozen
//! - **Aggregate Progress**: arithmetic mean across running operations for
//!   status displays
//! - **Severity Badges**: process-wide per-severity counters fed by failed
//!   operations
//!
//! ### 🧯 Error Store
//! - **Fingerprint Deduplication**: repeated failures merge into one entry
//!   instead of flooding the table
//! - **Auto-Resolution**: low-severity entries close themselves after a
//!   quiet period with no reoccurrence; critical entries never do
//! - **Pattern Detection**: fingerprint groups crossing a threshold become
//!   recurring-error patterns with prevention advice
//! - **Bounded Memory**: eviction prefers stale resolved entries over
//!   recent active incidents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flightdeck::{Monitor, MonitorConfig, OperationKind, OperationSpec};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let monitor = Monitor::new(MonitorConfig::default());
//!
//!     let result = monitor
//!         .tracker()
//!         .track(
//!             OperationSpec::new(OperationKind::ExternalCall, "Fetch"),
//!             |progress| async move {
//!                 progress.report(50).await;
//!                 Ok("done")
//!             },
//!         )
//!         .await?;
//!
//!     println!("{result}");
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Operation lifecycle tracking.
///
/// In-memory operation table, the lifecycle API
/// (start/update/complete/cancel), the `track` wrapper, and
/// aggregate-progress computation.
pub mod operation;

/// Error capture, classification, and self-healing storage.
///
/// Deduplicated bounded error table, deterministic classifier,
/// recurring-pattern detection, auto-resolution timers, and statistics
/// aggregation.
pub mod errors;

/// Metrics sink abstraction for dashboard persistence.
pub mod metrics;

/// Monitor configuration constants and TOML loading.
pub mod config;

/// High-level integration combining both subsystems.
pub mod system;

// Re-export the main configuration type
pub use config::MonitorConfig;

// Re-export main operation types
pub use operation::{
    Failure, Operation, OperationId, OperationKind, OperationSpec, OperationStatus,
    OperationTracker, OperationUpdate, ProgressHandle, SeverityCounts, TrackerError,
};

// Re-export main error store types
pub use errors::{
    ErrorCapture, ErrorCategory, ErrorEntry, ErrorFilter, ErrorId, ErrorPattern, ErrorSeverity,
    ErrorSource, ErrorState, ErrorStatistics, ErrorStore, PreventionAdvice, Resolution,
    ResolutionMethod, StoreError,
};

// Re-export the metrics seam and the integrated monitor
pub use metrics::{InMemorySink, MetricsSink};
pub use system::{Monitor, MonitorStatus};
