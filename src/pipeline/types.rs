//! Shared types for inbound processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::Channel;

// ── Inbound event ───────────────────────────────────────────────────

/// One message received from a customer. Built per webhook call and never
/// persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Phone number for sms/whatsapp, address for email, PSID for messenger.
    pub sender: String,
    /// Body text. For email this is subject and body joined with a space.
    pub content: String,
    pub channel: Channel,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, channel: Channel) -> Self {
        Self {
            sender: sender.into().trim().to_string(),
            content: content.into(),
            channel,
            received_at: Utc::now(),
        }
    }

    /// Email intake: subject and body are scanned together for keywords.
    pub fn from_email(sender: impl Into<String>, subject: &str, body: &str) -> Self {
        let content = [subject.trim(), body.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(sender, content, Channel::Email)
    }

    /// Lowercased, trimmed content used for keyword containment.
    pub fn normalized_content(&self) -> String {
        self.content.trim().to_lowercase()
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// What happened to one (event, workflow) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PairOutcome {
    Sent { provider_response: String },
    Scheduled { ticket: Uuid, delay_ms: u64 },
    NotConfigured,
    Failed { error: String },
}

impl PairOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PairOutcome::NotConfigured | PairOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    #[serde(flatten)]
    pub outcome: PairOutcome,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InboundReport {
    pub outcomes: Vec<WorkflowOutcome>,
}

impl InboundReport {
    /// True iff at least one workflow matched, whatever happened afterwards.
    pub fn matched(&self) -> bool {
        !self.outcomes.is_empty()
    }

    pub fn outcome_for(&self, workflow_id: Uuid) -> Option<&PairOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.workflow_id == workflow_id)
            .map(|o| &o.outcome)
    }
}
