//! Failure classification.
//!
//! Maps raw failure context (source, code, HTTP status, message) to a
//! category and severity, plus a prevention suggestion where one exists.
//! The rules are deterministic; anything unmatched falls back to `Medium`,
//! never to `Low`, so a misread failure is not quietly auto-resolved.

use crate::errors::types::{ErrorCapture, ErrorCategory, ErrorSeverity, ErrorSource};
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Result of classifying a raw failure
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub prevention: Option<String>,
}

/// Classify a raw failure into category, severity, and prevention advice
pub fn classify(capture: &ErrorCapture) -> Classification {
    let category = capture.category.unwrap_or_else(|| detect_category(capture));
    let (severity, prevention) = assess(capture);

    Classification {
        category,
        severity: capture.severity.unwrap_or(severity),
        prevention,
    }
}

fn detect_category(capture: &ErrorCapture) -> ErrorCategory {
    let message = capture.message.to_lowercase();

    if message.contains("validation") || message.contains("invalid") {
        return ErrorCategory::Validation;
    }
    if capture.http_status.is_some() || capture.code.is_some() {
        return ErrorCategory::Api;
    }

    match capture.source {
        ErrorSource::ServiceAlpha | ErrorSource::ServiceBeta => ErrorCategory::Api,
        ErrorSource::Backend => ErrorCategory::Runtime,
        ErrorSource::UiComponent => ErrorCategory::Ui,
    }
}

fn assess(capture: &ErrorCapture) -> (ErrorSeverity, Option<String>) {
    // Codes and message keywords share one haystack so either form matches.
    let mut haystack = capture.message.to_lowercase();
    if let Some(ref code) = capture.code {
        haystack.push(' ');
        haystack.push_str(&code.to_lowercase().replace('_', " "));
    }

    if haystack.contains("permission") || haystack.contains("denied") || haystack.contains("eacces")
    {
        return (
            ErrorSeverity::High,
            Some("verify filesystem and API permissions before dispatching work".to_string()),
        );
    }
    if haystack.contains("rate limit")
        || haystack.contains("rate limited")
        || haystack.contains("quota")
        || haystack.contains("429")
        || capture.http_status == Some(429)
    {
        return (
            ErrorSeverity::Medium,
            Some("implement request throttling or increase rate limits".to_string()),
        );
    }
    if haystack.contains("not found") || haystack.contains("enoent") {
        return (
            ErrorSeverity::Medium,
            Some("validate resource identifiers before issuing the request".to_string()),
        );
    }
    if haystack.contains("timeout") || haystack.contains("timed out") {
        return (
            ErrorSeverity::Medium,
            Some("raise the request timeout or split the work into smaller calls".to_string()),
        );
    }
    if haystack.contains("network")
        || haystack.contains("connection")
        || haystack.contains("econnrefused")
        || haystack.contains("dns")
    {
        return (
            ErrorSeverity::High,
            Some("add retry with exponential backoff for transient network failures".to_string()),
        );
    }

    if let Some(status) = capture.http_status {
        if status >= 500 {
            return (
                ErrorSeverity::High,
                Some("monitor the upstream service and fail over when it degrades".to_string()),
            );
        }
        if (400..500).contains(&status) {
            return (
                ErrorSeverity::Medium,
                Some("validate request parameters before calling the service".to_string()),
            );
        }
    }

    // Safe default: unmatched failures still warrant a look.
    (ErrorSeverity::Medium, None)
}

/// Prevention advice synthesized for a pattern, keyed by the representative
/// entry's category and source. Used when the entries themselves carry no
/// suggestion.
pub fn prevention_for(category: ErrorCategory, source: ErrorSource) -> String {
    match (category, source) {
        (ErrorCategory::Api, ErrorSource::ServiceAlpha | ErrorSource::ServiceBeta) => {
            "add retries with backoff and circuit breaking around external service calls"
                .to_string()
        }
        (ErrorCategory::Api, _) => {
            "validate request construction and audit the API contract".to_string()
        }
        (ErrorCategory::Runtime, _) => {
            "add guards around the failing backend path and extend integration coverage"
                .to_string()
        }
        (ErrorCategory::Ui, _) => {
            "add defensive state handling to the affected component".to_string()
        }
        (ErrorCategory::Validation, _) => {
            "validate inputs at the boundary before they reach this code path".to_string()
        }
    }
}

/// Normalize a message for fingerprinting: lowercase, volatile tokens
/// (numbers, hex ids, uuids) collapsed to `#`, whitespace squeezed.
pub fn normalize_message(message: &str) -> String {
    static VOLATILE: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let volatile = VOLATILE.get_or_init(|| {
        Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b|\b0x[0-9a-f]+\b|\b\d+\b")
            .expect("volatile token regex")
    });
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));

    let lowered = message.to_lowercase();
    let stripped = volatile.replace_all(&lowered, "#");
    spaces.replace_all(stripped.trim(), " ").to_string()
}

/// Compute the deduplication fingerprint for a failure.
///
/// Two failures with the same category, source, and normalized message hash
/// to the same fingerprint and merge into one entry.
pub fn fingerprint(category: ErrorCategory, source: ErrorSource, message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    category.as_str().hash(&mut hasher);
    source.as_str().hash(&mut hasher);
    normalize_message(message).hash(&mut hasher);

    format!("ERR-{:016X}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_gets_throttling_suggestion() {
        let capture = ErrorCapture::new(ErrorSource::ServiceAlpha, "Request was rate limited")
            .with_http_status(429);
        let classification = classify(&capture);

        assert_eq!(classification.severity, ErrorSeverity::Medium);
        assert_eq!(
            classification.prevention.as_deref(),
            Some("implement request throttling or increase rate limits")
        );
    }

    #[test]
    fn permission_denied_is_high() {
        let capture =
            ErrorCapture::new(ErrorSource::Backend, "write failed").with_code("PERMISSION_DENIED");
        assert_eq!(classify(&capture).severity, ErrorSeverity::High);
    }

    #[test]
    fn http_5xx_is_high_4xx_is_medium() {
        let server = ErrorCapture::new(ErrorSource::ServiceBeta, "upstream failure")
            .with_http_status(503);
        assert_eq!(classify(&server).severity, ErrorSeverity::High);

        let client =
            ErrorCapture::new(ErrorSource::ServiceBeta, "bad payload").with_http_status(422);
        assert_eq!(classify(&client).severity, ErrorSeverity::Medium);
    }

    #[test]
    fn unmatched_defaults_to_medium_not_low() {
        let capture = ErrorCapture::new(ErrorSource::Backend, "something odd happened");
        assert_eq!(classify(&capture).severity, ErrorSeverity::Medium);
    }

    #[test]
    fn category_falls_back_to_source() {
        let ui = ErrorCapture::new(ErrorSource::UiComponent, "render glitch");
        assert_eq!(classify(&ui).category, ErrorCategory::Ui);

        let backend = ErrorCapture::new(ErrorSource::Backend, "worker crashed");
        assert_eq!(classify(&backend).category, ErrorCategory::Runtime);
    }

    #[test]
    fn normalization_strips_volatile_tokens() {
        let a = normalize_message("Request 42 to 0xDEAD failed after 1500 ms");
        let b = normalize_message("request 7 to 0xbeef FAILED  after 900 ms");
        assert_eq!(a, b);

        let with_uuid =
            normalize_message("session 0b1f8c1e-1234-4abc-9def-0123456789ab not found");
        assert_eq!(with_uuid, "session # not found");
    }

    #[test]
    fn fingerprint_is_stable_across_volatile_details() {
        let a = fingerprint(
            ErrorCategory::Api,
            ErrorSource::ServiceAlpha,
            "timeout after 3000 ms",
        );
        let b = fingerprint(
            ErrorCategory::Api,
            ErrorSource::ServiceAlpha,
            "Timeout after 5000 ms",
        );
        let c = fingerprint(
            ErrorCategory::Api,
            ErrorSource::ServiceBeta,
            "timeout after 3000 ms",
        );

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("ERR-"));
    }
}
