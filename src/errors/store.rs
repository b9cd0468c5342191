use crate::config::MonitorConfig;
use crate::errors::classify::{self, classify, fingerprint};
use crate::errors::context::sanitize_context;
use crate::errors::stats::{self, ErrorStatistics};
use crate::errors::types::*;
use crate::metrics::MetricsSink;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deduplicated, classified, self-healing error store.
///
/// Single logical owner of the error table: capture serializes fingerprint
/// lookup and upsert under one write lock, so concurrent captures of the
/// same fingerprint cannot create duplicates. Low-severity entries are
/// auto-resolved after a quiet period with no reoccurrence; critical
/// entries always require manual resolution.
pub struct ErrorStore {
    entries: Arc<RwLock<HashMap<ErrorId, ErrorEntry>>>,
    patterns: Arc<RwLock<HashMap<String, ErrorPattern>>>,
    timers: Arc<Mutex<HashMap<ErrorId, JoinHandle<()>>>>,
    statistics: Arc<RwLock<ErrorStatistics>>,
    sink: Option<Arc<dyn MetricsSink>>,
    config: MonitorConfig,
}

impl ErrorStore {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_sink(config, None)
    }

    pub fn with_sink(config: MonitorConfig, sink: Option<Arc<dyn MetricsSink>>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(HashMap::new())),
            timers: Arc::new(Mutex::new(HashMap::new())),
            statistics: Arc::new(RwLock::new(ErrorStatistics::default())),
            sink,
            config,
        }
    }

    /// Capture a failure, merging it into an existing entry when the
    /// fingerprint already exists. Returns the entry id.
    ///
    /// Malformed context never fails capture; it is depth-limited and
    /// truncated instead.
    pub async fn capture_error(&self, capture: ErrorCapture) -> ErrorId {
        let classification = classify(&capture);
        let category = capture.category.unwrap_or(classification.category);
        let severity = capture.severity.unwrap_or(classification.severity);
        let fp = fingerprint(category, capture.source, &capture.message);
        let now = Utc::now();

        // Lookup-and-upsert stays under one write lock so concurrent
        // captures of the same fingerprint cannot race past each other.
        let (id, arm_timer) = {
            let mut entries = self.entries.write().await;

            let existing = entries
                .values_mut()
                .find(|e| e.fingerprint == fp && (!e.resolved || e.auto_resolved()));

            match existing {
                Some(entry) => {
                    entry.occurrences += 1;
                    entry.last_seen = now;
                    if entry.stack_trace.is_none() {
                        entry.stack_trace = capture.stack_trace.clone();
                    }
                    // Keep the context pointing at the latest failure site;
                    // a capture without context leaves the previous one.
                    if !capture.context.is_null() {
                        entry.context = sanitize_context(capture.context.clone());
                    }

                    if entry.auto_resolved() {
                        // A fingerprint that was closed automatically came
                        // back: reopen it as recurring.
                        entry.resolved = false;
                        entry.resolved_at = None;
                        entry.resolution_method = ResolutionMethod::None;
                        entry.recurring = true;
                        info!(
                            "Error {} recurred after auto-resolution (occurrences: {})",
                            entry.id, entry.occurrences
                        );
                    } else {
                        debug!(
                            "Merged reoccurrence into error {} (occurrences: {})",
                            entry.id, entry.occurrences
                        );
                    }

                    let arm = !entry.resolved && entry.severity == ErrorSeverity::Low;
                    (entry.id, arm)
                }
                None => {
                    let entry = ErrorEntry {
                        id: Uuid::new_v4(),
                        category,
                        source: capture.source,
                        severity,
                        message: capture.message.clone(),
                        stack_trace: capture.stack_trace.clone(),
                        context: sanitize_context(capture.context.clone()),
                        occurrences: 1,
                        first_seen: now,
                        last_seen: now,
                        resolved: false,
                        resolved_at: None,
                        resolution_method: ResolutionMethod::None,
                        recurring: false,
                        root_cause: None,
                        resolution_steps: Vec::new(),
                        prevention_suggestion: classification.prevention.clone(),
                        pattern_id: None,
                        fingerprint: fp.clone(),
                    };
                    let id = entry.id;
                    info!(
                        "Captured new {} error from {}: {}",
                        severity.as_str(),
                        capture.source.as_str(),
                        capture.message
                    );
                    entries.insert(id, entry);

                    let evicted = Self::evict_over_cap(&mut entries, self.config.max_errors_stored);
                    drop(entries);
                    self.cancel_timers(&evicted).await;

                    let arm = severity == ErrorSeverity::Low;
                    // Re-arming happens below; bail out of the block early.
                    if arm {
                        self.arm_auto_resolve(id).await;
                    }
                    return id;
                }
            }
        };

        // Reoccurrence debounces any pending auto-resolve timer: cancel and
        // reschedule rather than letting the original deadline fire.
        self.cancel_timer(id).await;
        if arm_timer {
            self.arm_auto_resolve(id).await;
        }

        id
    }

    /// Capture a failure raised by a UI component boundary
    pub async fn capture_ui_error(
        &self,
        message: &str,
        component: &str,
        stack_trace: Option<&str>,
    ) -> ErrorId {
        let mut capture = ErrorCapture::new(ErrorSource::UiComponent, message)
            .with_category(ErrorCategory::Ui)
            .with_context(serde_json::json!({ "component": component }));
        if let Some(trace) = stack_trace {
            capture = capture.with_stack_trace(trace);
        }
        self.capture_error(capture).await
    }

    /// Capture a failure raised by the backend process
    pub async fn capture_backend_error(&self, message: &str, operation: &str) -> ErrorId {
        let capture = ErrorCapture::new(ErrorSource::Backend, message)
            .with_context(serde_json::json!({ "operation": operation }));
        self.capture_error(capture).await
    }

    /// Capture a failure from an external service call
    pub async fn capture_service_error(
        &self,
        source: ErrorSource,
        message: &str,
        endpoint: Option<&str>,
        http_status: Option<u16>,
    ) -> ErrorId {
        let mut capture = ErrorCapture::new(source, message).with_category(ErrorCategory::Api);
        if let Some(endpoint) = endpoint {
            capture = capture.with_context(serde_json::json!({ "endpoint": endpoint }));
        }
        if let Some(status) = http_status {
            capture = capture.with_http_status(status);
        }
        self.capture_error(capture).await
    }

    /// Resolve an entry. Idempotent when already resolved by the same
    /// method; cancels any pending auto-resolve timer first.
    pub async fn resolve_error(
        &self,
        id: ErrorId,
        method: ResolutionMethod,
        resolution: Resolution,
    ) -> Result<(), StoreError> {
        // Cancel before mutating so a firing timer cannot race a manual
        // resolution that is about to land.
        self.cancel_timer(id).await;

        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if entry.resolved && entry.resolution_method == method {
            return Ok(());
        }

        entry.resolved = true;
        entry.resolved_at = Some(Utc::now());
        entry.resolution_method = method;
        entry.recurring = false;
        if resolution.root_cause.is_some() {
            entry.root_cause = resolution.root_cause;
        }
        if !resolution.steps.is_empty() {
            entry.resolution_steps = resolution.steps;
        }
        if !resolution.preventions.is_empty() {
            entry.prevention_suggestion = Some(resolution.preventions.join("; "));
        }

        info!("Resolved error {} ({:?})", id, method);
        Ok(())
    }

    /// Group entries by fingerprint and create or update patterns for the
    /// groups at or above the configured threshold.
    pub async fn detect_patterns(&self) -> Vec<ErrorPattern> {
        let mut entries = self.entries.write().await;

        let mut groups: HashMap<String, (u32, Vec<ErrorId>)> = HashMap::new();
        for entry in entries.values() {
            let group = groups
                .entry(entry.fingerprint.clone())
                .or_insert((0, Vec::new()));
            group.0 += entry.occurrences;
            group.1.push(entry.id);
        }

        let mut patterns = self.patterns.write().await;
        let now = Utc::now();

        for (fp, (occurrences, mut related)) in groups {
            if occurrences < self.config.pattern_threshold {
                continue;
            }
            related.sort();

            let representative = related
                .first()
                .and_then(|id| entries.get(id))
                .cloned();

            let pattern = patterns.entry(fp.clone()).or_insert_with(|| {
                let suggestion = representative
                    .as_ref()
                    .and_then(|entry| entry.prevention_suggestion.clone())
                    .unwrap_or_else(|| {
                        let entry = representative.as_ref();
                        classify::prevention_for(
                            entry.map(|e| e.category).unwrap_or(ErrorCategory::Runtime),
                            entry.map(|e| e.source).unwrap_or(ErrorSource::Backend),
                        )
                    });
                info!(
                    "Detected recurring error pattern {} ({} occurrences)",
                    fp, occurrences
                );
                ErrorPattern {
                    id: Uuid::new_v4(),
                    fingerprint: fp.clone(),
                    occurrences: 0,
                    related_error_ids: Vec::new(),
                    first_detected: now,
                    suggested_prevention: suggestion,
                }
            });

            pattern.occurrences = occurrences;
            pattern.related_error_ids = related.clone();

            for id in &related {
                if let Some(entry) = entries.get_mut(id) {
                    entry.pattern_id = Some(pattern.id);
                }
            }
        }

        patterns.values().cloned().collect()
    }

    /// Prevention report for every pattern above the threshold
    pub async fn generate_prevention_report(&self) -> Vec<PreventionAdvice> {
        let patterns = self.detect_patterns().await;
        patterns
            .into_iter()
            .map(|pattern| PreventionAdvice {
                suggested_prevention: pattern.suggested_prevention.clone(),
                pattern,
            })
            .collect()
    }

    /// Recompute statistics over the trailing window and persist headline
    /// values to the metrics sink, best-effort.
    pub async fn update_statistics(&self, window: chrono::Duration) -> ErrorStatistics {
        let snapshot: Vec<ErrorEntry> = {
            let entries = self.entries.read().await;
            entries.values().cloned().collect()
        };

        let computed = stats::compute(
            &snapshot,
            window,
            self.config.trend_bucket(),
            self.config.top_errors_limit,
        );

        {
            let mut statistics = self.statistics.write().await;
            *statistics = computed.clone();
        }

        // Persistence is fire-and-forget: a sink failure is logged and never
        // reaches the caller.
        if let Some(sink) = self.sink.clone() {
            let total = computed.total_errors as f64;
            let rate = computed.resolution_rate as f64;
            let at = computed.computed_at.unwrap_or_else(Utc::now);
            tokio::spawn(async move {
                if let Err(e) = sink.submit_metric("errors.total", total, at).await {
                    warn!("Failed to persist error metrics: {:#}", e);
                }
                if let Err(e) = sink.submit_metric("errors.resolution_rate", rate, at).await {
                    warn!("Failed to persist resolution rate: {:#}", e);
                }
            });
        }

        computed
    }

    /// Last computed statistics snapshot
    pub async fn statistics(&self) -> ErrorStatistics {
        let statistics = self.statistics.read().await;
        statistics.clone()
    }

    /// Get a single entry by id
    pub async fn get_error(&self, id: ErrorId) -> Option<ErrorEntry> {
        let entries = self.entries.read().await;
        entries.get(&id).cloned()
    }

    /// Snapshot of every entry, most recent first
    pub async fn all_errors(&self) -> Vec<ErrorEntry> {
        let entries = self.entries.read().await;
        let mut all: Vec<ErrorEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        all
    }

    /// Query entries with a filter, most recent first
    pub async fn find_errors(&self, filter: &ErrorFilter) -> Vec<ErrorEntry> {
        let entries = self.entries.read().await;
        let mut matched: Vec<ErrorEntry> = entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Snapshot of detected patterns
    pub async fn patterns(&self) -> Vec<ErrorPattern> {
        let patterns = self.patterns.read().await;
        patterns.values().cloned().collect()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cancel all pending auto-resolve timers. Called on teardown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        let count = timers.len();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        if count > 0 {
            debug!("Cancelled {} pending auto-resolve timers", count);
        }
    }

    /// Schedule (or reschedule) the auto-resolve timer for an entry.
    ///
    /// The firing task re-checks the entry under the write lock, so a
    /// resolution or reoccurrence that lands between firing and locking
    /// wins over the timer. A merge can land while a stale timer is
    /// blocked on the lock, so the quiet period is also re-validated
    /// against `last_seen`: an entry seen again inside the window is
    /// never resolved by a timer armed before that occurrence.
    async fn arm_auto_resolve(&self, id: ErrorId) {
        let timeout = self.config.auto_resolve_timeout();
        let quiet = chrono::Duration::milliseconds(self.config.auto_resolve_timeout_ms as i64);
        let entries = Arc::clone(&self.entries);
        let timers = Arc::clone(&self.timers);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            {
                let mut table = entries.write().await;
                if let Some(entry) = table.get_mut(&id)
                    && !entry.resolved
                    && entry.severity != ErrorSeverity::Critical
                    && Utc::now().signed_duration_since(entry.last_seen) >= quiet
                {
                    entry.resolved = true;
                    entry.resolved_at = Some(Utc::now());
                    entry.resolution_method = ResolutionMethod::Automatic;
                    entry.recurring = false;
                    info!("Auto-resolved error {} after quiet period", id);
                }
            }

            let mut timers = timers.lock().await;
            timers.remove(&id);
        });

        let mut timers = self.timers.lock().await;
        if let Some(previous) = timers.insert(id, handle) {
            previous.abort();
        }
    }

    async fn cancel_timer(&self, id: ErrorId) {
        let mut timers = self.timers.lock().await;
        if let Some(handle) = timers.remove(&id) {
            handle.abort();
            debug!("Cancelled auto-resolve timer for error {}", id);
        }
    }

    async fn cancel_timers(&self, ids: &[ErrorId]) {
        if ids.is_empty() {
            return;
        }
        let mut timers = self.timers.lock().await;
        for id in ids {
            if let Some(handle) = timers.remove(id) {
                handle.abort();
            }
        }
    }

    /// Evict entries past the cap: resolved entries first (oldest last_seen
    /// first), then the oldest unresolved ones. Returns evicted ids.
    fn evict_over_cap(
        entries: &mut HashMap<ErrorId, ErrorEntry>,
        max_stored: usize,
    ) -> Vec<ErrorId> {
        if entries.len() <= max_stored {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        let overflow = entries.len() - max_stored;

        let mut resolved: Vec<(ErrorId, chrono::DateTime<Utc>)> = entries
            .values()
            .filter(|e| e.resolved)
            .map(|e| (e.id, e.last_seen))
            .collect();
        resolved.sort_by_key(|(_, last_seen)| *last_seen);

        for (id, _) in resolved.into_iter().take(overflow) {
            entries.remove(&id);
            evicted.push(id);
        }

        if entries.len() > max_stored {
            let remaining = entries.len() - max_stored;
            let mut unresolved: Vec<(ErrorId, chrono::DateTime<Utc>)> = entries
                .values()
                .map(|e| (e.id, e.last_seen))
                .collect();
            unresolved.sort_by_key(|(_, last_seen)| *last_seen);

            for (id, _) in unresolved.into_iter().take(remaining) {
                entries.remove(&id);
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            info!("Evicted {} error entries over the storage cap", evicted.len());
        }
        evicted
    }
}
