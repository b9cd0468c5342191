//! Statistics aggregation.
//!
//! Recomputes dashboard-facing rates and summaries on demand from the
//! current error table. Pure computation; the store owns the snapshot and
//! the best-effort sink submission.

use crate::errors::types::{ErrorEntry, ErrorId, ErrorSeverity, ErrorState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated error statistics for dashboards
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ErrorStatistics {
    pub total_errors: u32,
    pub resolved_errors: u32,
    pub auto_resolved_errors: u32,
    pub recurring_errors: u32,
    pub errors_by_category: HashMap<String, u32>,
    pub errors_by_severity: HashMap<String, u32>,
    pub errors_by_source: HashMap<String, u32>,
    /// resolved / total, 0.0 when the table is empty
    pub resolution_rate: f32,
    /// auto-resolved / total, 0.0 when the table is empty
    pub auto_resolution_rate: f32,
    /// Mean seconds from first occurrence to resolution
    pub mean_time_to_resolution_secs: Option<i64>,
    pub top_errors: Vec<ErrorSummary>,
    pub error_trends: Vec<TrendBucket>,
    pub computed_at: Option<DateTime<Utc>>,
}

/// Compact per-entry line for the top-N summary
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorSummary {
    pub id: ErrorId,
    pub message: String,
    pub category: String,
    pub severity: ErrorSeverity,
    pub occurrences: u32,
    pub last_seen: DateTime<Utc>,
    pub state: ErrorState,
}

/// One bucket of the trend series
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrendBucket {
    pub bucket_start: DateTime<Utc>,
    pub count: u32,
}

/// Recompute statistics from a snapshot of the error table.
///
/// `window` bounds the trend series; entries outside it still count toward
/// the totals, matching how the badge counters behave.
pub fn compute(
    entries: &[ErrorEntry],
    window: chrono::Duration,
    bucket: chrono::Duration,
    top_limit: usize,
) -> ErrorStatistics {
    let now = Utc::now();
    let mut stats = ErrorStatistics {
        total_errors: entries.len() as u32,
        computed_at: Some(now),
        ..Default::default()
    };

    let mut resolution_secs: Vec<i64> = Vec::new();

    for entry in entries {
        if entry.resolved {
            stats.resolved_errors += 1;
            if entry.auto_resolved() {
                stats.auto_resolved_errors += 1;
            }
            if let Some(elapsed) = entry.time_to_resolution() {
                resolution_secs.push(elapsed.num_seconds());
            }
        } else if entry.recurring {
            stats.recurring_errors += 1;
        }

        *stats
            .errors_by_category
            .entry(entry.category.as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .errors_by_severity
            .entry(entry.severity.as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .errors_by_source
            .entry(entry.source.as_str().to_string())
            .or_insert(0) += 1;
    }

    if stats.total_errors > 0 {
        stats.resolution_rate = stats.resolved_errors as f32 / stats.total_errors as f32;
        stats.auto_resolution_rate = stats.auto_resolved_errors as f32 / stats.total_errors as f32;
    }

    if !resolution_secs.is_empty() {
        let total: i64 = resolution_secs.iter().sum();
        stats.mean_time_to_resolution_secs = Some(total / resolution_secs.len() as i64);
    }

    stats.top_errors = top_errors(entries, top_limit);
    stats.error_trends = trends(entries, now, window, bucket);
    stats
}

fn top_errors(entries: &[ErrorEntry], limit: usize) -> Vec<ErrorSummary> {
    let mut sorted: Vec<&ErrorEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
    });

    sorted
        .into_iter()
        .take(limit)
        .map(|entry| ErrorSummary {
            id: entry.id,
            message: entry.message.clone(),
            category: entry.category.as_str().to_string(),
            severity: entry.severity,
            occurrences: entry.occurrences,
            last_seen: entry.last_seen,
            state: entry.state(),
        })
        .collect()
}

fn trends(
    entries: &[ErrorEntry],
    now: DateTime<Utc>,
    window: chrono::Duration,
    bucket: chrono::Duration,
) -> Vec<TrendBucket> {
    if bucket <= chrono::Duration::zero() || window <= chrono::Duration::zero() {
        return Vec::new();
    }

    let window_start = now - window;
    let mut buckets = Vec::new();
    let mut bucket_start = window_start;

    while bucket_start < now {
        let bucket_end = bucket_start + bucket;
        let count = entries
            .iter()
            .filter(|entry| entry.last_seen >= bucket_start && entry.last_seen < bucket_end)
            .count() as u32;

        buckets.push(TrendBucket {
            bucket_start,
            count,
        });
        bucket_start = bucket_end;
    }

    buckets
}
