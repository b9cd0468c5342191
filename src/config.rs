//! Monitor configuration
//!
//! All tunables of the tracker and the error store live in [`MonitorConfig`].
//! The defaults match the values used in interactive deployments; tests
//! typically shorten the auto-resolve timeout to milliseconds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Unified configuration for the operation tracker and error store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Upper bound on retained error entries before eviction kicks in.
    pub max_errors_stored: usize,
    /// Quiet period after which an unresolved low-severity error is
    /// resolved automatically.
    pub auto_resolve_timeout_ms: u64,
    /// Occurrence count at which a fingerprint group becomes a pattern.
    pub pattern_threshold: u32,
    /// Delay between an operation being created and it transitioning to
    /// running. Zero means the transition happens immediately; a small
    /// value lets slow UI polls observe the pending state.
    pub pending_delay_ms: u64,
    /// Number of entries reported in the top-errors summary.
    pub top_errors_limit: usize,
    /// Width of a single bucket in the error trend series.
    pub trend_bucket_minutes: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_errors_stored: 100,
            auto_resolve_timeout_ms: 30 * 60 * 1000,
            pattern_threshold: 3,
            pending_delay_ms: 0,
            top_errors_limit: 10,
            trend_bucket_minutes: 60,
        }
    }
}

impl MonitorConfig {
    /// Auto-resolve quiet period as a std duration for timer scheduling.
    pub fn auto_resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.auto_resolve_timeout_ms)
    }

    /// Pending-to-running delay as a std duration.
    pub fn pending_delay(&self) -> Duration {
        Duration::from_millis(self.pending_delay_ms)
    }

    /// Trend bucket width for statistics windows.
    pub fn trend_bucket(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.trend_bucket_minutes as i64)
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config file {:?}", path.as_ref()))?;
        let config: MonitorConfig =
            toml::from_str(&content).context("parsing monitor config")?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serializing monitor config")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config file {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.max_errors_stored, 100);
        assert_eq!(config.pattern_threshold, 3);
        assert_eq!(config.auto_resolve_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.pending_delay(), Duration::ZERO);
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flightdeck.toml");

        let mut config = MonitorConfig::default();
        config.max_errors_stored = 42;
        config.auto_resolve_timeout_ms = 1500;
        config.to_toml_file(&path).unwrap();

        let loaded = MonitorConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.max_errors_stored, 42);
        assert_eq!(loaded.auto_resolve_timeout_ms, 1500);
        assert_eq!(loaded.pattern_threshold, 3);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = MonitorConfig::from_toml_file("/nonexistent/flightdeck.toml");
        assert!(result.is_err());
    }
}
