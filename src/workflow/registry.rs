//! Workflow registry: the set of automations visible to the matcher.
//!
//! The engine only reads from the registry. Writes (status transitions,
//! create/delete) belong to whoever owns workflow persistence; the
//! in-memory implementation exposes them as inherent methods.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, WorkflowError};
use crate::workflow::model::{Workflow, WorkflowStatus};

/// Read-only view of workflow persistence.
#[async_trait]
pub trait WorkflowRegistry: Send + Sync {
    /// All workflows with `status == active`.
    async fn active_workflows(&self) -> Result<Vec<Workflow>, DatabaseError>;

    /// Look up a workflow by ID regardless of status.
    async fn get(&self, id: Uuid) -> Result<Option<Workflow>, DatabaseError>;
}

/// In-memory registry.
#[derive(Default)]
pub struct InMemoryRegistry {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `workflows`.
    pub fn with_workflows(workflows: impl IntoIterator<Item = Workflow>) -> Self {
        let map = workflows.into_iter().map(|w| (w.id, w)).collect();
        Self {
            workflows: RwLock::new(map),
        }
    }

    /// Load a JSON array of workflow records.
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        let workflows: Vec<Workflow> = serde_json::from_str(json)
            .map_err(|e| WorkflowError::InvalidDefinition(e.to_string()))?;
        Ok(Self::with_workflows(workflows))
    }

    /// Insert or replace a workflow.
    pub async fn upsert(&self, workflow: Workflow) {
        debug!(workflow_id = %workflow.id, status = %workflow.status, "Workflow upserted");
        self.workflows.write().await.insert(workflow.id, workflow);
    }

    /// Transition a workflow's status. Visible to every lookup that starts
    /// after this returns.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: WorkflowStatus,
    ) -> Result<Workflow, WorkflowError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(WorkflowError::NotFound { id })?;
        workflow.status = status;
        workflow.updated_at = Utc::now();
        info!(workflow_id = %id, status = %status, "Workflow status changed");
        Ok(workflow.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<Workflow> {
        self.workflows.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowRegistry for InMemoryRegistry {
    async fn active_workflows(&self) -> Result<Vec<Workflow>, DatabaseError> {
        let workflows = self.workflows.read().await;
        let mut active: Vec<Workflow> = workflows
            .values()
            .filter(|w| w.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|w| w.created_at);
        Ok(active)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Workflow>, DatabaseError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }
}
