use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for tracked operations
pub type OperationId = Uuid;

/// A tracked unit of asynchronous work with progress and a terminal outcome
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub name: String,
    pub description: String,
    pub status: OperationStatus,
    /// Completion percentage, 0-100. Meaningful while running; frozen once
    /// the operation reaches a terminal state (completed forces 100).
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Weak reference into the error store; a lookup key, never shared state.
    pub attached_error: Option<Uuid>,
    pub metadata: HashMap<String, String>,
}

/// Kind of work the operation represents
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ExternalCall,
    FileOp,
    BuildStep,
    ToolExec,
    ModelRequest,
}

/// Operation lifecycle state.
///
/// Transitions: `Pending -> Running -> {Completed, Error, Cancelled}`.
/// No transition ever leaves a terminal state.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    /// Created but not yet running
    Pending,
    /// Actively executing; progress updates apply
    Running,
    /// Finished successfully
    Completed,
    /// Finished with a recorded failure
    Error,
    /// Cancelled by the caller; recorded as a low-severity failure
    Cancelled,
}

/// Specification for starting a new operation
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub name: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

/// Partial update merged into a tracked operation.
///
/// Progress is monotonic while running; a lower value is clamped to the
/// current progress unless `reset_progress` is set.
#[derive(Clone, Debug, Default)]
pub struct OperationUpdate {
    pub progress: Option<u8>,
    /// Requested status; applied only when the transition is legal
    pub status: Option<OperationStatus>,
    pub metadata: HashMap<String, String>,
    pub reset_progress: bool,
}

/// Errors returned by the operation tracker
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid operation spec: {0}")]
    InvalidSpec(String),
    #[error("unknown operation: {0}")]
    NotFound(OperationId),
}

impl OperationSpec {
    pub fn new(kind: OperationKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

impl Operation {
    /// Create a new pending operation from a spec
    pub fn new(spec: OperationSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: spec.kind,
            name: spec.name,
            description: spec.description,
            status: OperationStatus::Pending,
            progress: 0,
            started_at: Utc::now(),
            ended_at: None,
            attached_error: None,
            metadata: spec.metadata,
        }
    }

    /// Check if the operation is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OperationStatus::Completed | OperationStatus::Error | OperationStatus::Cancelled
        )
    }

    /// Check if the operation is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.status, OperationStatus::Running)
    }

    /// Check if the operation has not started yet
    pub fn is_pending(&self) -> bool {
        matches!(self.status, OperationStatus::Pending)
    }

    /// Elapsed time since start; uses the end timestamp once terminal
    pub fn duration(&self) -> Duration {
        self.ended_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
    }
}

impl OperationStatus {
    /// Check whether moving from `self` to `to` is a legal transition.
    /// Terminal states are frozen and pending must pass through running.
    pub fn can_transition_to(&self, to: OperationStatus) -> bool {
        match (self, to) {
            (OperationStatus::Pending, OperationStatus::Running) => true,
            (
                OperationStatus::Running,
                OperationStatus::Completed | OperationStatus::Error | OperationStatus::Cancelled,
            ) => true,
            _ => false,
        }
    }
}

impl OperationUpdate {
    pub fn progress(value: u8) -> Self {
        Self {
            progress: Some(value),
            ..Default::default()
        }
    }

    pub fn status(status: OperationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn reset() -> Self {
        Self {
            progress: Some(0),
            reset_progress: true,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}
