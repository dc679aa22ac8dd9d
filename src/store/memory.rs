//! In-memory execution log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::execution::ExecutionLogEntry;
use crate::store::traits::ExecutionLogStore;

type WorkflowLog = Arc<Mutex<Vec<ExecutionLogEntry>>>;

/// Per-workflow logs behind their own lock, so one busy workflow never
/// blocks appends to another.
#[derive(Default)]
pub struct InMemoryLogStore {
    logs: RwLock<HashMap<Uuid, WorkflowLog>>,
}

impl InMemoryLogStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryLogStore {
    async fn append(
        &self,
        workflow_id: Uuid,
        entry: ExecutionLogEntry,
    ) -> Result<(), DatabaseError> {
        debug!(workflow_id = %workflow_id, kind = %entry.kind, "Execution log append");
        // The map guard is held until the push lands, so `delete_workflow`
        // can never detach a log an append is about to write into.
        {
            let logs = self.logs.read().await;
            if let Some(log) = logs.get(&workflow_id) {
                log.lock().await.push(entry);
                return Ok(());
            }
        }
        let mut logs = self.logs.write().await;
        logs.entry(workflow_id).or_default().lock().await.push(entry);
        Ok(())
    }

    async fn read(&self, workflow_id: Uuid) -> Result<Vec<ExecutionLogEntry>, DatabaseError> {
        let log = self.logs.read().await.get(&workflow_id).cloned();
        match log {
            Some(log) => Ok(log.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<usize, DatabaseError> {
        let mut logs = self.logs.write().await;
        match logs.remove(&workflow_id) {
            Some(log) => Ok(log.lock().await.len()),
            None => Ok(0),
        }
    }
}
