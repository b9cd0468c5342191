//! Metrics sink abstraction.
//!
//! Dashboard persistence is behind the [`MetricsSink`] trait so the core
//! keeps working entirely in memory when no backend is configured. Sink
//! failures are logged by callers and never surface to tracking code.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Destination for aggregated monitor metrics.
///
/// Implementations must be cheap to call; submission happens on a spawned
/// task and is best-effort.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record a single metric value under a category.
    async fn submit_metric(&self, category: &str, value: f64, timestamp: DateTime<Utc>)
    -> Result<()>;

    /// Return the points recorded within the trailing window, oldest first.
    async fn query_recent(&self, window: chrono::Duration)
    -> Result<Vec<(DateTime<Utc>, f64)>>;
}

/// In-memory sink used as the default backend and in tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    points: Arc<RwLock<Vec<MetricPoint>>>,
}

#[derive(Debug, Clone)]
struct MetricPoint {
    category: String,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points recorded for a category, oldest first.
    pub async fn points_for(&self, category: &str) -> Vec<(DateTime<Utc>, f64)> {
        let points = self.points.read().await;
        points
            .iter()
            .filter(|p| p.category == category)
            .map(|p| (p.timestamp, p.value))
            .collect()
    }
}

#[async_trait]
impl MetricsSink for InMemorySink {
    async fn submit_metric(
        &self,
        category: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut points = self.points.write().await;
        points.push(MetricPoint {
            category: category.to_string(),
            value,
            timestamp,
        });
        Ok(())
    }

    async fn query_recent(
        &self,
        window: chrono::Duration,
    ) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let cutoff = Utc::now() - window;
        let points = self.points.read().await;
        let mut recent: Vec<_> = points
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .map(|p| (p.timestamp, p.value))
            .collect();
        recent.sort_by_key(|(ts, _)| *ts);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_and_query() {
        let sink = InMemorySink::new();
        let now = Utc::now();

        sink.submit_metric("errors.total", 3.0, now).await.unwrap();
        sink.submit_metric("errors.total", 5.0, now).await.unwrap();
        sink.submit_metric("operations.progress", 50.0, now - chrono::Duration::hours(2))
            .await
            .unwrap();

        let recent = sink.query_recent(chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(recent.len(), 2);

        let totals = sink.points_for("errors.total").await;
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[1].1, 5.0);
    }
}
