use crate::errors::{ErrorCapture, ErrorSeverity, ErrorSource, ErrorStore};
use crate::operation::store::OperationStore;
use crate::operation::types::*;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Structured failure handed to the tracker on completion.
///
/// Severity and source are optional; the error store's classifier fills
/// them in from the message and code when absent.
#[derive(Clone, Debug)]
pub struct Failure {
    pub message: String,
    pub code: Option<String>,
    pub http_status: Option<u16>,
    pub severity: Option<ErrorSeverity>,
    pub source: Option<ErrorSource>,
    pub stack_trace: Option<String>,
}

impl Failure {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: None,
            http_status: None,
            severity: None,
            source: None,
            stack_trace: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// Process-wide per-severity counters backing UI badges.
///
/// Incremented once per operation that ends in error; never decremented,
/// not even by the clear-completed sweep.
#[derive(Debug, Default)]
pub struct SeverityCounters {
    low: AtomicU64,
    medium: AtomicU64,
    high: AtomicU64,
    critical: AtomicU64,
}

/// Point-in-time snapshot of the severity counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounters {
    fn record(&self, severity: ErrorSeverity) {
        let counter = match severity {
            ErrorSeverity::Low => &self.low,
            ErrorSeverity::Medium => &self.medium,
            ErrorSeverity::High => &self.high,
            ErrorSeverity::Critical => &self.critical,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SeverityCounts {
        SeverityCounts {
            low: self.low.load(Ordering::Relaxed),
            medium: self.medium.load(Ordering::Relaxed),
            high: self.high.load(Ordering::Relaxed),
            critical: self.critical.load(Ordering::Relaxed),
        }
    }
}

/// Progress-reporting callback handed to tracked work.
///
/// Cheap to clone; reports go through the same per-id serialized mutation
/// path as any other update.
#[derive(Clone)]
pub struct ProgressHandle {
    id: OperationId,
    store: OperationStore,
}

impl ProgressHandle {
    /// The id of the operation this handle reports for
    pub fn operation_id(&self) -> OperationId {
        self.id
    }

    /// Report progress (0-100). Clamped to be monotonic while running.
    pub async fn report(&self, progress: u8) {
        let progress = progress.min(100);
        self.store
            .mutate(self.id, |op| {
                if op.is_running() && progress > op.progress {
                    op.progress = progress;
                }
            })
            .await;
    }
}

/// Lifecycle API over the operation table.
///
/// Owns all operation mutation; failures on completion are forwarded to
/// the error store and recorded against the severity badge counters.
pub struct OperationTracker {
    store: OperationStore,
    errors: Arc<ErrorStore>,
    counters: Arc<SeverityCounters>,
    pending_delay: std::time::Duration,
}

impl OperationTracker {
    pub fn new(errors: Arc<ErrorStore>, pending_delay: std::time::Duration) -> Self {
        Self {
            store: OperationStore::new(),
            errors,
            counters: Arc::new(SeverityCounters::default()),
            pending_delay,
        }
    }

    /// Start tracking a new operation.
    ///
    /// The operation is created pending and transitions to running either
    /// immediately or after the configured delay, which lets slow UI polls
    /// observe the pending state for very short-lived work.
    pub async fn start_operation(&self, spec: OperationSpec) -> Result<OperationId, TrackerError> {
        if spec.name.trim().is_empty() {
            return Err(TrackerError::InvalidSpec(
                "operation name must not be empty".to_string(),
            ));
        }

        let operation = Operation::new(spec);
        let id = self.store.insert(operation).await;
        debug!("Started operation {}", id);

        if self.pending_delay.is_zero() {
            self.store
                .mutate(id, |op| op.status = OperationStatus::Running)
                .await;
        } else {
            let store = self.store.clone();
            let delay = self.pending_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                store
                    .mutate(id, |op| {
                        // The operation may already be terminal if the work
                        // finished inside the delay window.
                        if op.is_pending() {
                            op.status = OperationStatus::Running;
                        }
                    })
                    .await;
            });
        }

        Ok(id)
    }

    /// Merge a partial update into an operation.
    ///
    /// No-op for unknown ids and terminal operations; late updates after an
    /// external cancellation must not fail their callers.
    pub async fn update_operation(&self, id: OperationId, update: OperationUpdate) {
        self.store
            .mutate(id, |op| {
                if op.is_terminal() {
                    return;
                }
                if let Some(progress) = update.progress {
                    let progress = progress.min(100);
                    if update.reset_progress || progress > op.progress {
                        op.progress = progress;
                    }
                }
                if let Some(status) = update.status
                    && op.status.can_transition_to(status)
                {
                    op.status = status;
                    if op.is_terminal() {
                        op.ended_at = Some(Utc::now());
                        if status == OperationStatus::Completed {
                            op.progress = 100;
                        }
                    }
                }
                for (key, value) in update.metadata {
                    op.metadata.insert(key, value);
                }
            })
            .await;
    }

    /// Complete an operation, recording the failure if one is given.
    ///
    /// Success forces progress to 100. A failure moves the operation to the
    /// error state, forwards the failure to the error store with operation
    /// context, and bumps the matching severity counter.
    pub async fn complete_operation(&self, id: OperationId, failure: Option<Failure>) {
        match failure {
            None => {
                self.store
                    .mutate(id, |op| {
                        if op.is_terminal() {
                            return;
                        }
                        op.status = OperationStatus::Completed;
                        op.progress = 100;
                        op.ended_at = Some(Utc::now());
                    })
                    .await;
                info!("Completed operation {}", id);
            }
            Some(failure) => self.fail_operation(id, failure).await,
        }
    }

    /// Cancel an operation. Equivalent to completing it with a synthesized
    /// low-severity failure; the record ends in the error state.
    pub async fn cancel_operation(&self, id: OperationId) {
        let failure = Failure::new("Operation cancelled by user").with_severity(ErrorSeverity::Low);
        self.fail_operation(id, failure).await;
    }

    async fn fail_operation(&self, id: OperationId, failure: Failure) {
        // Claim the terminal transition under the lock first: of two racing
        // completions for the same id, exactly one records the failure.
        let mut claimed = false;
        let mut operation_name = String::new();
        let known = self
            .store
            .mutate(id, |op| {
                if !op.is_terminal() {
                    op.status = OperationStatus::Error;
                    op.ended_at = Some(Utc::now());
                    claimed = true;
                    operation_name = op.name.clone();
                }
            })
            .await;

        if !known {
            debug!("Ignoring completion of unknown operation {}", id);
            return;
        }
        if !claimed {
            return;
        }

        // Capture outside the operation lock; the error store serializes
        // its own table access.
        let mut capture = ErrorCapture::new(
            failure.source.unwrap_or(ErrorSource::Backend),
            &failure.message,
        )
        .with_context(serde_json::json!({
            "operation_id": id.to_string(),
            "operation_name": operation_name,
        }));
        if let Some(code) = failure.code {
            capture = capture.with_code(&code);
        }
        if let Some(status) = failure.http_status {
            capture = capture.with_http_status(status);
        }
        if let Some(severity) = failure.severity {
            capture = capture.with_severity(severity);
        }
        if let Some(trace) = failure.stack_trace {
            capture = capture.with_stack_trace(&trace);
        }

        let error_id = self.errors.capture_error(capture).await;

        if let Some(entry) = self.errors.get_error(error_id).await {
            self.counters.record(entry.severity);
        }

        self.store
            .mutate(id, |op| op.attached_error = Some(error_id))
            .await;

        warn!("Operation {} ended in error (error {})", id, error_id);
    }

    /// Run a unit of work as a tracked operation.
    ///
    /// The closure receives a progress handle. On success the operation is
    /// completed; on failure it is completed with the failure and the
    /// original error is returned to the caller. Errors are recorded, never
    /// swallowed.
    pub async fn track<F, Fut, T>(&self, spec: OperationSpec, work: F) -> Result<T>
    where
        F: FnOnce(ProgressHandle) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = self.start_operation(spec).await?;
        let handle = ProgressHandle {
            id,
            store: self.store.clone(),
        };

        match work(handle).await {
            Ok(value) => {
                self.complete_operation(id, None).await;
                Ok(value)
            }
            Err(error) => {
                let failure = Failure::new(&error.to_string());
                self.complete_operation(id, Some(failure)).await;
                Err(error)
            }
        }
    }

    /// Arithmetic mean of progress across running operations; 0 when none
    pub async fn overall_progress(&self) -> f64 {
        let running = self.store.running().await;
        if running.is_empty() {
            return 0.0;
        }
        let total: u64 = running.iter().map(|op| op.progress as u64).sum();
        total as f64 / running.len() as f64
    }

    /// Elapsed time of an operation; uses the end timestamp once terminal
    pub async fn operation_duration(&self, id: OperationId) -> Result<Duration, TrackerError> {
        let operation = self.store.get(id).await.ok_or(TrackerError::NotFound(id))?;
        Ok(operation.duration())
    }

    /// Remove terminal operations from the table
    pub async fn clear_completed(&self) -> Vec<OperationId> {
        self.store.clear_terminal().await
    }

    /// Snapshot of a single operation
    pub async fn get_operation(&self, id: OperationId) -> Option<Operation> {
        self.store.get(id).await
    }

    /// Snapshot of all tracked operations
    pub async fn all_operations(&self) -> Vec<Operation> {
        self.store.all().await
    }

    /// Snapshot of operations currently running
    pub async fn running_operations(&self) -> Vec<Operation> {
        self.store.running().await
    }

    /// Current severity badge counters
    pub fn severity_counts(&self) -> SeverityCounts {
        self.counters.snapshot()
    }
}
