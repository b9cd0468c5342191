use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for captured errors
pub type ErrorId = Uuid;

/// Unique identifier for recurring-error patterns
pub type PatternId = Uuid;

/// A deduplicated, classified error record
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorEntry {
    pub id: ErrorId,
    pub category: ErrorCategory,
    pub source: ErrorSource,
    pub severity: ErrorSeverity,
    pub message: String,
    pub stack_trace: Option<String>,
    /// Sanitized, depth-limited context map
    pub context: serde_json::Map<String, Value>,
    pub occurrences: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_method: ResolutionMethod,
    /// Set when a previously auto-resolved fingerprint reoccurred
    pub recurring: bool,
    pub root_cause: Option<String>,
    pub resolution_steps: Vec<String>,
    pub prevention_suggestion: Option<String>,
    pub pattern_id: Option<PatternId>,
    /// Normalized signature used for deduplication
    pub fingerprint: String,
}

/// Broad classification of what went wrong
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Api,
    Runtime,
    Ui,
    Validation,
}

/// Where the failure originated
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    ServiceAlpha,
    ServiceBeta,
    Backend,
    UiComponent,
}

/// How bad it is
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// How an entry got resolved
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionMethod {
    None,
    Manual,
    Automatic,
}

/// Derived lifecycle state of an entry.
///
/// `New -> {InProgress, Recurring} -> {Resolved, AutoResolved}`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorState {
    New,
    InProgress,
    Recurring,
    Resolved,
    AutoResolved,
}

/// Raw failure context handed to the store for capture
#[derive(Clone, Debug)]
pub struct ErrorCapture {
    pub source: ErrorSource,
    pub message: String,
    /// Explicit category; classified from the context when absent
    pub category: Option<ErrorCategory>,
    /// Explicit severity; classified from the context when absent
    pub severity: Option<ErrorSeverity>,
    /// Machine error code from the failing component, e.g. `TIMEOUT`
    pub code: Option<String>,
    /// HTTP status when the failure came off the wire
    pub http_status: Option<u16>,
    pub stack_trace: Option<String>,
    pub context: Value,
}

/// Narrative fields attached when resolving an entry
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub root_cause: Option<String>,
    pub steps: Vec<String>,
    pub preventions: Vec<String>,
}

/// A group of errors sharing a fingerprint that recurs above the threshold
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorPattern {
    pub id: PatternId,
    pub fingerprint: String,
    pub occurrences: u32,
    pub related_error_ids: Vec<ErrorId>,
    pub first_detected: DateTime<Utc>,
    pub suggested_prevention: String,
}

/// One line of the prevention report handed to external tooling
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PreventionAdvice {
    pub pattern: ErrorPattern,
    pub suggested_prevention: String,
}

/// Filter for querying the error table
#[derive(Clone, Debug, Default)]
pub struct ErrorFilter {
    pub category: Option<ErrorCategory>,
    pub severity: Option<ErrorSeverity>,
    pub source: Option<ErrorSource>,
    pub resolved: Option<bool>,
    /// Substring match against the message
    pub text: Option<String>,
    pub limit: Option<usize>,
}

/// Errors returned by the store's fallible operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("unknown error entry: {0}")]
    NotFound(ErrorId),
}

impl ErrorCapture {
    pub fn new(source: ErrorSource, message: &str) -> Self {
        Self {
            source,
            message: message.to_string(),
            category: None,
            severity: None,
            code: None,
            http_status: None,
            stack_trace: None,
            context: Value::Null,
        }
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_stack_trace(mut self, trace: &str) -> Self {
        self.stack_trace = Some(trace.to_string());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

impl ErrorEntry {
    /// Derived lifecycle state for display
    pub fn state(&self) -> ErrorState {
        if self.resolved {
            if self.resolution_method == ResolutionMethod::Automatic {
                ErrorState::AutoResolved
            } else {
                ErrorState::Resolved
            }
        } else if self.recurring {
            ErrorState::Recurring
        } else if self.occurrences > 1 {
            ErrorState::InProgress
        } else {
            ErrorState::New
        }
    }

    /// True when the entry was closed by the auto-resolver
    pub fn auto_resolved(&self) -> bool {
        self.resolved && self.resolution_method == ResolutionMethod::Automatic
    }

    /// Time from first occurrence to resolution, if resolved
    pub fn time_to_resolution(&self) -> Option<chrono::Duration> {
        self.resolved_at
            .map(|at| at.signed_duration_since(self.first_seen))
    }
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Api => "api",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Ui => "ui",
            ErrorCategory::Validation => "validation",
        }
    }
}

impl ErrorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSource::ServiceAlpha => "service-alpha",
            ErrorSource::ServiceBeta => "service-beta",
            ErrorSource::Backend => "backend",
            ErrorSource::UiComponent => "ui-component",
        }
    }
}

impl ErrorFilter {
    /// Check a single entry against every set field
    pub fn matches(&self, entry: &ErrorEntry) -> bool {
        if let Some(category) = self.category
            && entry.category != category
        {
            return false;
        }
        if let Some(severity) = self.severity
            && entry.severity != severity
        {
            return false;
        }
        if let Some(source) = self.source
            && entry.source != source
        {
            return false;
        }
        if let Some(resolved) = self.resolved
            && entry.resolved != resolved
        {
            return false;
        }
        if let Some(ref text) = self.text
            && !entry.message.to_lowercase().contains(&text.to_lowercase())
        {
            return false;
        }
        true
    }
}
