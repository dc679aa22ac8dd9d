//! `ExecutionLogStore` trait: append-only per-workflow execution history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::execution::ExecutionLogEntry;

/// Backend-agnostic execution log.
///
/// Appends to one workflow's log are serialized so entries come back in
/// insertion order; appends to different workflows may proceed concurrently.
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    /// Append an entry to a workflow's log.
    async fn append(&self, workflow_id: Uuid, entry: ExecutionLogEntry)
    -> Result<(), DatabaseError>;

    /// All entries for a workflow, in insertion order.
    async fn read(&self, workflow_id: Uuid) -> Result<Vec<ExecutionLogEntry>, DatabaseError>;

    /// Drop a workflow's whole log. Returns the number of entries removed.
    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<usize, DatabaseError>;
}
