use crate::operation::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Shared in-memory table of tracked operations.
///
/// The tracker is the only writer; all mutation goes through methods that
/// take the write lock for the whole read-modify-write, so per-id updates
/// never interleave.
#[derive(Clone, Default)]
pub struct OperationStore {
    operations: Arc<RwLock<HashMap<OperationId, Operation>>>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created operation
    pub async fn insert(&self, operation: Operation) -> OperationId {
        let id = operation.id;
        let mut operations = self.operations.write().await;
        operations.insert(id, operation);
        id
    }

    /// Get a snapshot of a single operation
    pub async fn get(&self, id: OperationId) -> Option<Operation> {
        let operations = self.operations.read().await;
        operations.get(&id).cloned()
    }

    /// Snapshot of every tracked operation
    pub async fn all(&self) -> Vec<Operation> {
        let operations = self.operations.read().await;
        operations.values().cloned().collect()
    }

    /// Snapshot of operations currently running
    pub async fn running(&self) -> Vec<Operation> {
        let operations = self.operations.read().await;
        operations
            .values()
            .filter(|op| op.is_running())
            .cloned()
            .collect()
    }

    /// Number of tracked operations
    pub async fn len(&self) -> usize {
        let operations = self.operations.read().await;
        operations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply a closure to an operation under the write lock.
    ///
    /// Returns `false` if the id is unknown; late mutations after a sweep
    /// are tolerated rather than treated as errors.
    pub async fn mutate<F>(&self, id: OperationId, f: F) -> bool
    where
        F: FnOnce(&mut Operation),
    {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(operation) => {
                f(operation);
                true
            }
            None => {
                debug!("Ignoring mutation of unknown operation {}", id);
                false
            }
        }
    }

    /// Remove every operation in a terminal state, returning the removed ids
    pub async fn clear_terminal(&self) -> Vec<OperationId> {
        let mut operations = self.operations.write().await;
        let removed: Vec<OperationId> = operations
            .values()
            .filter(|op| op.is_terminal())
            .map(|op| op.id)
            .collect();

        for id in &removed {
            operations.remove(id);
        }

        if !removed.is_empty() {
            info!("Cleared {} completed operations", removed.len());
        }
        removed
    }
}
