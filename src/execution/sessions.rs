//! Display-side grouping of log entries into conversation sessions.
//!
//! A session is a cluster of entries for the same recipient that are close
//! together in time. Sessions are derived on read and never stored.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::log::ExecutionLogEntry;

/// Two entries within this many milliseconds belong to the same session.
pub const SESSION_WINDOW_MS: i64 = 60_000;

/// How entries are clustered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStrategy {
    /// Single pass in the given order; each entry joins the first session
    /// whose anchor (first entry) is within the window. Order-dependent.
    #[default]
    Greedy,
    /// Per recipient, entries sorted by time and chained while consecutive
    /// gaps stay within the window. Independent of input order.
    Transitive,
}

impl FromStr for SessionStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greedy" => Ok(SessionStrategy::Greedy),
            "transitive" => Ok(SessionStrategy::Transitive),
            other => Err(format!("unknown session strategy: {other}")),
        }
    }
}

/// A group of related log entries.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// `recipient_<anchor millis>`.
    pub key: String,
    pub recipient: String,
    pub anchor: DateTime<Utc>,
    pub entries: Vec<ExecutionLogEntry>,
}

impl Session {
    fn start(entry: ExecutionLogEntry) -> Self {
        Self {
            key: session_key(&entry.recipient, entry.timestamp),
            recipient: entry.recipient.clone(),
            anchor: entry.timestamp,
            entries: vec![entry],
        }
    }
}

fn session_key(recipient: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", recipient, at.timestamp_millis())
}

fn within_window(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (a - b).abs() <= TimeDelta::milliseconds(SESSION_WINDOW_MS)
}

/// Group entries using `strategy`. Sessions are returned in the order they
/// were opened.
pub fn group_sessions(
    entries: impl IntoIterator<Item = ExecutionLogEntry>,
    strategy: SessionStrategy,
) -> Vec<Session> {
    match strategy {
        SessionStrategy::Greedy => group_greedy(entries),
        SessionStrategy::Transitive => group_transitive(entries),
    }
}

fn group_greedy(entries: impl IntoIterator<Item = ExecutionLogEntry>) -> Vec<Session> {
    let mut sessions: Vec<Session> = Vec::new();

    for entry in entries {
        let existing = sessions
            .iter_mut()
            .find(|s| s.recipient == entry.recipient && within_window(s.anchor, entry.timestamp));
        match existing {
            Some(session) => session.entries.push(entry),
            None => sessions.push(Session::start(entry)),
        }
    }

    sessions
}

fn group_transitive(entries: impl IntoIterator<Item = ExecutionLogEntry>) -> Vec<Session> {
    let mut by_recipient: HashMap<String, Vec<ExecutionLogEntry>> = HashMap::new();
    for entry in entries {
        by_recipient
            .entry(entry.recipient.clone())
            .or_default()
            .push(entry);
    }

    let mut sessions: Vec<Session> = Vec::new();
    for (_, mut group) in by_recipient {
        group.sort_by_key(|e| e.timestamp);
        let mut current: Option<Session> = None;
        for entry in group {
            let chained = current
                .as_ref()
                .and_then(|s| s.entries.last())
                .is_some_and(|last| within_window(last.timestamp, entry.timestamp));

            match current.as_mut() {
                Some(session) if chained => session.entries.push(entry),
                _ => {
                    if let Some(done) = current.replace(Session::start(entry)) {
                        sessions.push(done);
                    }
                }
            }
        }
        sessions.extend(current);
    }

    sessions.sort_by(|a, b| a.anchor.cmp(&b.anchor).then_with(|| a.key.cmp(&b.key)));
    sessions
}
