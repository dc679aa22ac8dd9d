//! Execution log entries: the auditable history of what a workflow did.
//!
//! Entries are appended at each transition of an (event, workflow) pair and
//! never mutated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::Delivery;
use crate::workflow::Channel;

/// Maximum characters of sent content shown in the entry message.
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Success,
    Error,
}

/// Which transition produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Received,
    TriggerMatched,
    MissingTemplate,
    Scheduled,
    Sent,
    Failed,
    Cancelled,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Received => "received",
            EntryKind::TriggerMatched => "trigger_matched",
            EntryKind::MissingTemplate => "missing_template",
            EntryKind::Scheduled => "scheduled",
            EntryKind::Sent => "sent",
            EntryKind::Failed => "failed",
            EntryKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(EntryKind::Received),
            "trigger_matched" => Ok(EntryKind::TriggerMatched),
            "missing_template" => Ok(EntryKind::MissingTemplate),
            "scheduled" => Ok(EntryKind::Scheduled),
            "sent" => Ok(EntryKind::Sent),
            "failed" => Ok(EntryKind::Failed),
            "cancelled" => Ok(EntryKind::Cancelled),
            other => Err(format!("unknown entry kind: {other}")),
        }
    }
}

/// One execution event for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub channel: Channel,
    pub recipient: String,
    /// Absent for internal bookkeeping entries (trigger match, scheduling).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub status: EntryStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalized_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_value: Option<String>,
}

impl ExecutionLogEntry {
    fn base(
        kind: EntryKind,
        channel: Channel,
        recipient: &str,
        status: EntryStatus,
        message: String,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            channel,
            recipient: recipient.to_string(),
            direction: None,
            status,
            message,
            error: None,
            provider_response: None,
            original_content: None,
            personalized_content: None,
            trigger_type: None,
            trigger_value: None,
        }
    }

    /// The inbound message was received.
    pub fn received(channel: Channel, sender: &str, content: &str) -> Self {
        Self {
            direction: Some(Direction::Incoming),
            original_content: Some(content.to_string()),
            ..Self::base(
                EntryKind::Received,
                channel,
                sender,
                EntryStatus::Success,
                format!("Received {channel} message: \"{}\"", preview(content)),
            )
        }
    }

    pub fn trigger_matched(channel: Channel, sender: &str, keyword: &str) -> Self {
        Self {
            trigger_type: Some("keyword".to_string()),
            trigger_value: Some(keyword.to_string()),
            ..Self::base(
                EntryKind::TriggerMatched,
                channel,
                sender,
                EntryStatus::Success,
                format!("Trigger matched: keyword \"{keyword}\""),
            )
        }
    }

    pub fn missing_template(channel: Channel, sender: &str) -> Self {
        let message = format!("No message template configured for channel {channel}");
        Self {
            error: Some(message.clone()),
            ..Self::base(
                EntryKind::MissingTemplate,
                channel,
                sender,
                EntryStatus::Error,
                message,
            )
        }
    }

    pub fn scheduled(channel: Channel, sender: &str, delay: &str) -> Self {
        Self::base(
            EntryKind::Scheduled,
            channel,
            sender,
            EntryStatus::Success,
            format!("Scheduled to send in {}", delay.trim()),
        )
    }

    pub fn sent(channel: Channel, recipient: &str, original: &str, delivery: &Delivery) -> Self {
        Self {
            direction: Some(Direction::Outgoing),
            provider_response: Some(delivery.handle.to_string()),
            original_content: Some(original.to_string()),
            personalized_content: Some(delivery.personalized_content.clone()),
            ..Self::base(
                EntryKind::Sent,
                channel,
                recipient,
                EntryStatus::Success,
                format!(
                    "Sent {channel} message: \"{}\"",
                    preview(&delivery.personalized_content)
                ),
            )
        }
    }

    pub fn failed(channel: Channel, recipient: &str, original: &str, error: &str) -> Self {
        Self {
            direction: Some(Direction::Outgoing),
            error: Some(error.to_string()),
            original_content: Some(original.to_string()),
            ..Self::base(
                EntryKind::Failed,
                channel,
                recipient,
                EntryStatus::Error,
                format!("Failed to send {channel} message: {error}"),
            )
        }
    }

    pub fn cancelled(channel: Channel, recipient: &str) -> Self {
        Self::base(
            EntryKind::Cancelled,
            channel,
            recipient,
            EntryStatus::Success,
            "Scheduled send cancelled".to_string(),
        )
    }

    pub fn is_error(&self) -> bool {
        self.status == EntryStatus::Error
    }
}

/// First `PREVIEW_CHARS` characters, with an ellipsis when cut.
fn preview(s: &str) -> String {
    match s.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
