//! High-level monitor integration.
//!
//! Wires the operation tracker and the error store into a single service
//! instance constructed once at process start. Rendering and
//! instrumentation callers hold a reference to the [`Monitor`] and call
//! into the two subsystems through it; teardown cancels every pending
//! auto-resolve timer.

use crate::config::MonitorConfig;
use crate::errors::ErrorStore;
use crate::metrics::MetricsSink;
use crate::operation::OperationTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Integrated monitor combining operation tracking and error capture
pub struct Monitor {
    tracker: Arc<OperationTracker>,
    errors: Arc<ErrorStore>,
    config: MonitorConfig,
}

/// Headline numbers for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running_operations: usize,
    pub overall_progress: f64,
    pub total_errors: usize,
    pub unresolved_errors: usize,
}

impl Monitor {
    /// Build a monitor with no metrics backend; everything stays in memory
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_sink(config, None)
    }

    /// Build a monitor that persists aggregate metrics to the given sink
    pub fn with_sink(config: MonitorConfig, sink: Option<Arc<dyn MetricsSink>>) -> Self {
        let errors = Arc::new(ErrorStore::with_sink(config.clone(), sink));
        let tracker = Arc::new(OperationTracker::new(
            Arc::clone(&errors),
            config.pending_delay(),
        ));

        info!(
            "Monitor initialized (max errors: {}, auto-resolve: {}ms)",
            config.max_errors_stored, config.auto_resolve_timeout_ms
        );

        Self {
            tracker,
            errors,
            config,
        }
    }

    /// The operation tracker subsystem
    pub fn tracker(&self) -> &Arc<OperationTracker> {
        &self.tracker
    }

    /// The error store subsystem
    pub fn errors(&self) -> &Arc<ErrorStore> {
        &self.errors
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Headline status for dashboards
    pub async fn status(&self) -> MonitorStatus {
        let running = self.tracker.running_operations().await.len();
        let overall_progress = self.tracker.overall_progress().await;
        let all = self.errors.all_errors().await;
        let unresolved = all.iter().filter(|e| !e.resolved).count();

        MonitorStatus {
            running_operations: running,
            overall_progress,
            total_errors: all.len(),
            unresolved_errors: unresolved,
        }
    }

    /// Tear the monitor down, cancelling all pending auto-resolve timers
    pub async fn shutdown(&self) {
        self.errors.shutdown().await;
        info!("Monitor shut down");
    }
}
