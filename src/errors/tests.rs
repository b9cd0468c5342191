#[cfg(test)]
mod tests {
    use crate::config::MonitorConfig;
    use crate::errors::store::ErrorStore;
    use crate::errors::types::*;
    use std::time::Duration;

    fn test_config(auto_resolve_timeout_ms: u64) -> MonitorConfig {
        MonitorConfig {
            auto_resolve_timeout_ms,
            ..Default::default()
        }
    }

    fn test_store() -> ErrorStore {
        ErrorStore::new(test_config(60_000))
    }

    /// Distinct two-letter token so messages normalize to distinct
    /// fingerprints (numeric suffixes would collapse to one).
    fn variant(i: usize) -> String {
        let hi = (b'a' + (i / 26) as u8) as char;
        let lo = (b'a' + (i % 26) as u8) as char;
        format!("disk {hi}{lo} unavailable")
    }

    #[tokio::test]
    async fn capture_assigns_classification_defaults() {
        let store = test_store();
        let id = store
            .capture_error(ErrorCapture::new(
                ErrorSource::Backend,
                "Connection refused by upstream",
            ))
            .await;

        let entry = store.get_error(id).await.unwrap();
        assert_eq!(entry.severity, ErrorSeverity::High);
        assert_eq!(entry.occurrences, 1);
        assert!(!entry.resolved);
        assert_eq!(entry.state(), ErrorState::New);
        assert!(entry.fingerprint.starts_with("ERR-"));
    }

    #[tokio::test]
    async fn reoccurrence_merges_into_existing_entry() {
        let store = test_store();
        let first = store
            .capture_backend_error("Config file missing", "load_config")
            .await;
        let second = store
            .capture_backend_error("Config file missing", "load_config")
            .await;

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);

        let entry = store.get_error(first).await.unwrap();
        assert_eq!(entry.occurrences, 2);
        assert!(entry.last_seen >= entry.first_seen);
        assert_eq!(entry.state(), ErrorState::InProgress);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_captures_of_one_fingerprint_never_duplicate() {
        let store = std::sync::Arc::new(test_store());

        let captures = (0..16).map(|_| {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .capture_backend_error("Config file missing", "load_config")
                    .await
            })
        });
        let ids = futures::future::join_all(captures).await;

        let first = ids[0].as_ref().unwrap();
        for id in &ids {
            assert_eq!(id.as_ref().unwrap(), first);
        }
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_error(*first).await.unwrap().occurrences, 16);
    }

    #[tokio::test]
    async fn volatile_message_parts_do_not_split_fingerprints() {
        let store = test_store();
        let a = store
            .capture_backend_error("Connection failed after 3 retries", "sync")
            .await;
        let b = store
            .capture_backend_error("Connection failed after 14 retries", "sync")
            .await;

        assert_eq!(a, b);
        assert_eq!(store.get_error(a).await.unwrap().occurrences, 2);
    }

    #[tokio::test]
    async fn different_sources_stay_separate() {
        let store = test_store();
        store
            .capture_service_error(ErrorSource::ServiceAlpha, "Request timeout", None, None)
            .await;
        store
            .capture_service_error(ErrorSource::ServiceBeta, "Request timeout", None, None)
            .await;

        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn manually_resolved_entries_do_not_absorb_new_captures() {
        let store = test_store();
        let id = store.capture_backend_error("Lock poisoned", "flush").await;
        store
            .resolve_error(id, ResolutionMethod::Manual, Resolution::default())
            .await
            .unwrap();

        let fresh = store.capture_backend_error("Lock poisoned", "flush").await;
        assert_ne!(id, fresh);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get_error(fresh).await.unwrap().occurrences, 1);
    }

    #[tokio::test]
    async fn resolve_is_idempotent_and_rejects_unknown_ids() {
        let store = test_store();
        let id = store.capture_backend_error("Oversized payload", "send").await;

        let resolution = Resolution {
            root_cause: Some("Payload exceeded frame limit".to_string()),
            steps: vec!["Chunk the payload".to_string()],
            preventions: vec!["Validate payload size before send".to_string()],
        };
        store
            .resolve_error(id, ResolutionMethod::Manual, resolution.clone())
            .await
            .unwrap();
        store
            .resolve_error(id, ResolutionMethod::Manual, resolution)
            .await
            .unwrap();

        let entry = store.get_error(id).await.unwrap();
        assert!(entry.resolved);
        assert_eq!(entry.resolution_method, ResolutionMethod::Manual);
        assert_eq!(entry.state(), ErrorState::Resolved);
        assert!(entry.root_cause.is_some());
        assert!(entry.time_to_resolution().is_some());

        let missing = store
            .resolve_error(
                uuid::Uuid::new_v4(),
                ResolutionMethod::Manual,
                Resolution::default(),
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn low_severity_entries_auto_resolve_after_quiet_period() {
        let store = ErrorStore::new(test_config(40));
        let id = store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                    .with_severity(ErrorSeverity::Low),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        let entry = store.get_error(id).await.unwrap();
        assert!(entry.resolved);
        assert_eq!(entry.resolution_method, ResolutionMethod::Automatic);
        assert!(entry.resolved_at.is_some());
        assert_eq!(entry.state(), ErrorState::AutoResolved);
    }

    #[tokio::test]
    async fn reoccurrence_debounces_the_auto_resolve_timer() {
        let store = ErrorStore::new(test_config(120));
        let capture = || {
            ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                .with_severity(ErrorSeverity::Low)
        };

        let id = store.capture_error(capture()).await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        store.capture_error(capture()).await;

        // Past the original deadline, but within the rescheduled one
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!store.get_error(id).await.unwrap().resolved);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get_error(id).await.unwrap().resolved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn merge_landing_at_the_deadline_keeps_the_entry_open() {
        let store = ErrorStore::new(test_config(80));
        let capture = || {
            ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                .with_severity(ErrorSeverity::Low)
        };

        // Merge right at the timer deadline: even if the original timer
        // fires first, the refreshed last_seen must keep the entry open.
        let id = store.capture_error(capture()).await;
        tokio::time::sleep(Duration::from_millis(78)).await;
        store.capture_error(capture()).await;

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(!store.get_error(id).await.unwrap().resolved);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let entry = store.get_error(id).await.unwrap();
        assert!(entry.resolved);
        assert_eq!(entry.resolution_method, ResolutionMethod::Automatic);
    }

    #[tokio::test]
    async fn reoccurrence_refreshes_context_to_the_latest_failure_site() {
        let store = test_store();
        let id = store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Config file missing")
                    .with_context(serde_json::json!({ "operation": "load_config" })),
            )
            .await;
        store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Config file missing")
                    .with_context(serde_json::json!({ "operation": "reload_config" })),
            )
            .await;

        let entry = store.get_error(id).await.unwrap();
        assert_eq!(
            entry.context.get("operation"),
            Some(&serde_json::json!("reload_config"))
        );

        // A capture without context keeps the previous one
        store
            .capture_error(ErrorCapture::new(ErrorSource::Backend, "Config file missing"))
            .await;
        let entry = store.get_error(id).await.unwrap();
        assert_eq!(
            entry.context.get("operation"),
            Some(&serde_json::json!("reload_config"))
        );
    }

    #[tokio::test]
    async fn critical_entries_are_never_auto_resolved() {
        let store = ErrorStore::new(test_config(30));
        let id = store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Data corruption detected")
                    .with_severity(ErrorSeverity::Critical),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!store.get_error(id).await.unwrap().resolved);
    }

    #[tokio::test]
    async fn manual_resolution_cancels_the_pending_timer() {
        let store = ErrorStore::new(test_config(60));
        let id = store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                    .with_severity(ErrorSeverity::Low),
            )
            .await;

        store
            .resolve_error(id, ResolutionMethod::Manual, Resolution::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let entry = store.get_error(id).await.unwrap();
        assert_eq!(entry.resolution_method, ResolutionMethod::Manual);
    }

    #[tokio::test]
    async fn auto_resolved_fingerprint_reopens_as_recurring() {
        let store = ErrorStore::new(test_config(40));
        let capture = || {
            ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                .with_severity(ErrorSeverity::Low)
        };

        let id = store.capture_error(capture()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get_error(id).await.unwrap().auto_resolved());

        let reopened = store.capture_error(capture()).await;
        assert_eq!(id, reopened);

        let entry = store.get_error(id).await.unwrap();
        assert!(!entry.resolved);
        assert!(entry.recurring);
        assert_eq!(entry.occurrences, 2);
        assert_eq!(entry.state(), ErrorState::Recurring);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_all_timers() {
        let store = ErrorStore::new(test_config(40));
        let id = store
            .capture_error(
                ErrorCapture::new(ErrorSource::Backend, "Transient cache miss")
                    .with_severity(ErrorSeverity::Low),
            )
            .await;

        store.shutdown().await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!store.get_error(id).await.unwrap().resolved);
    }

    #[tokio::test]
    async fn storage_stays_bounded_and_drops_the_oldest() {
        let store = ErrorStore::new(MonitorConfig::default());
        let mut ids = Vec::new();
        for i in 0..105 {
            ids.push(store.capture_backend_error(&variant(i), "batch").await);
        }

        assert_eq!(store.len().await, 100);
        for id in &ids[..5] {
            assert!(store.get_error(*id).await.is_none());
        }
        for id in &ids[5..] {
            assert!(store.get_error(*id).await.is_some());
        }
    }

    #[tokio::test]
    async fn eviction_prefers_resolved_entries() {
        let store = ErrorStore::new(MonitorConfig {
            max_errors_stored: 3,
            ..Default::default()
        });

        let oldest = store.capture_backend_error(&variant(0), "batch").await;
        let resolved = store.capture_backend_error(&variant(1), "batch").await;
        store.capture_backend_error(&variant(2), "batch").await;
        store
            .resolve_error(resolved, ResolutionMethod::Manual, Resolution::default())
            .await
            .unwrap();

        store.capture_backend_error(&variant(3), "batch").await;

        assert_eq!(store.len().await, 3);
        assert!(store.get_error(resolved).await.is_none());
        // Older unresolved entries survive while a resolved one exists
        assert!(store.get_error(oldest).await.is_some());
    }

    #[tokio::test]
    async fn repeated_timeouts_form_a_pattern() {
        let store = test_store();
        for _ in 0..5 {
            store
                .capture_service_error(
                    ErrorSource::ServiceAlpha,
                    "Request timeout",
                    Some("/v1/completions"),
                    None,
                )
                .await;
        }

        let patterns = store.detect_patterns().await;
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 5);
        assert!(!patterns[0].suggested_prevention.is_empty());

        let entry = &store.all_errors().await[0];
        assert_eq!(entry.pattern_id, Some(patterns[0].id));
    }

    #[tokio::test]
    async fn below_threshold_groups_produce_no_pattern() {
        let store = test_store();
        store.capture_backend_error("Lock poisoned", "flush").await;
        store.capture_backend_error("Lock poisoned", "flush").await;

        assert!(store.detect_patterns().await.is_empty());
    }

    #[tokio::test]
    async fn prevention_report_covers_every_pattern() {
        let store = test_store();
        for _ in 0..4 {
            store
                .capture_service_error(ErrorSource::ServiceBeta, "Request timeout", None, None)
                .await;
        }

        let report = store.generate_prevention_report().await;
        assert_eq!(report.len(), 1);
        assert_eq!(
            report[0].suggested_prevention,
            report[0].pattern.suggested_prevention
        );
    }

    #[tokio::test]
    async fn statistics_report_rates_over_all_entries() {
        let store = test_store();
        let a = store.capture_backend_error(&variant(0), "batch").await;
        let b = store.capture_backend_error(&variant(1), "batch").await;
        store.capture_backend_error(&variant(2), "batch").await;
        store.capture_backend_error(&variant(3), "batch").await;
        // Bump occurrences so top_errors has a clear winner
        store.capture_backend_error(&variant(3), "batch").await;

        store
            .resolve_error(a, ResolutionMethod::Manual, Resolution::default())
            .await
            .unwrap();
        store
            .resolve_error(b, ResolutionMethod::Automatic, Resolution::default())
            .await
            .unwrap();

        let stats = store.update_statistics(chrono::Duration::hours(24)).await;
        assert_eq!(stats.total_errors, 4);
        assert_eq!(stats.resolved_errors, 2);
        assert_eq!(stats.auto_resolved_errors, 1);
        assert_eq!(stats.resolution_rate, 0.5);
        assert_eq!(stats.auto_resolution_rate, 0.25);
        assert!(stats.mean_time_to_resolution_secs.is_some());
        assert_eq!(stats.errors_by_source.get("backend"), Some(&4));

        assert_eq!(stats.top_errors[0].message, variant(3));
        assert_eq!(stats.top_errors[0].occurrences, 2);
        assert!(!stats.error_trends.is_empty());

        // The snapshot accessor returns the same computation
        let cached = store.statistics().await;
        assert_eq!(cached.total_errors, stats.total_errors);
        assert_eq!(cached.computed_at, stats.computed_at);
    }

    #[tokio::test]
    async fn find_errors_applies_every_filter_field() {
        let store = test_store();
        store
            .capture_ui_error("Render failed", "Dashboard", Some("at render()"))
            .await;
        let resolved = store
            .capture_backend_error("Connection refused by upstream", "sync")
            .await;
        store.capture_backend_error(&variant(0), "batch").await;
        store
            .resolve_error(resolved, ResolutionMethod::Manual, Resolution::default())
            .await
            .unwrap();

        let ui_only = store
            .find_errors(&ErrorFilter {
                source: Some(ErrorSource::UiComponent),
                ..Default::default()
            })
            .await;
        assert_eq!(ui_only.len(), 1);
        assert_eq!(ui_only[0].category, ErrorCategory::Ui);
        assert_eq!(
            ui_only[0].context.get("component"),
            Some(&serde_json::json!("Dashboard"))
        );

        let unresolved = store
            .find_errors(&ErrorFilter {
                resolved: Some(false),
                ..Default::default()
            })
            .await;
        assert_eq!(unresolved.len(), 2);

        let by_text = store
            .find_errors(&ErrorFilter {
                text: Some("connection".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(by_text.len(), 1);

        let limited = store
            .find_errors(&ErrorFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await;
        assert_eq!(limited.len(), 1);
    }
}
