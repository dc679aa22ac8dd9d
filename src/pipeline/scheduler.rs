//! Delayed sends as cancellable timer tasks.
//!
//! Every scheduled send is a spawned task that sleeps on a tokio timer and
//! then runs its job. The task is tracked by ticket until it starts
//! dispatching; until then it can be aborted by ticket or by workflow.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::workflow::Channel;

/// Handle returned when a send is scheduled; redeemable for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendTicket {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub fire_at: DateTime<Utc>,
}

/// A send retracted before it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledSend {
    pub ticket: Uuid,
    pub workflow_id: Uuid,
    pub channel: Channel,
    pub recipient: String,
}

struct PendingSend {
    workflow_id: Uuid,
    channel: Channel,
    recipient: String,
    handle: JoinHandle<()>,
}

impl PendingSend {
    fn cancel(self, ticket: Uuid) -> CancelledSend {
        self.handle.abort();
        CancelledSend {
            ticket,
            workflow_id: self.workflow_id,
            channel: self.channel,
            recipient: self.recipient,
        }
    }
}

#[derive(Clone, Default)]
pub struct SendScheduler {
    pending: Arc<Mutex<HashMap<Uuid, PendingSend>>>,
}

impl SendScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` after `delay` without blocking the caller.
    pub async fn schedule<F>(
        &self,
        workflow_id: Uuid,
        channel: Channel,
        recipient: &str,
        delay: Duration,
        job: F,
    ) -> SendTicket
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = SendTicket {
            id: Uuid::new_v4(),
            workflow_id,
            fire_at: chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        // Hold the lock across spawn + insert so the task cannot look itself
        // up before it is registered.
        let mut pending = self.pending.lock().await;
        let tracked = Arc::clone(&self.pending);
        let ticket_id = ticket.id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tracked.lock().await.remove(&ticket_id).is_none() {
                return;
            }
            debug!(ticket = %ticket_id, "Scheduled send firing");
            job.await;
        });
        pending.insert(
            ticket.id,
            PendingSend {
                workflow_id,
                channel,
                recipient: recipient.to_string(),
                handle,
            },
        );

        debug!(
            ticket = %ticket.id,
            workflow_id = %workflow_id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Send scheduled"
        );
        ticket
    }

    /// Retract a single pending send. `None` if it already fired or was
    /// cancelled.
    pub async fn cancel(&self, ticket: Uuid) -> Option<CancelledSend> {
        let removed = self.pending.lock().await.remove(&ticket);
        removed.map(|send| send.cancel(ticket))
    }

    /// Retract every pending send belonging to `workflow_id`.
    pub async fn cancel_workflow(&self, workflow_id: Uuid) -> Vec<CancelledSend> {
        let mut pending = self.pending.lock().await;
        let tickets: Vec<Uuid> = pending
            .iter()
            .filter(|(_, send)| send.workflow_id == workflow_id)
            .map(|(id, _)| *id)
            .collect();

        let cancelled: Vec<CancelledSend> = tickets
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|send| send.cancel(id)))
            .collect();

        if !cancelled.is_empty() {
            info!(workflow_id = %workflow_id, count = cancelled.len(), "Cancelled scheduled sends");
        }
        cancelled
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn pending_for(&self, workflow_id: Uuid) -> usize {
        self.pending
            .lock()
            .await
            .values()
            .filter(|send| send.workflow_id == workflow_id)
            .count()
    }
}
