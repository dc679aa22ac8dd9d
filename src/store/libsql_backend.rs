//! libSQL backend for the execution log. Supports local file and in-memory
//! databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::execution::{Direction, EntryStatus, ExecutionLogEntry};
use crate::store::migrations;
use crate::store::traits::ExecutionLogStore;

/// Execution log persisted in a libSQL database.
///
/// A single connection is reused. Appends go through `write_lock` so the
/// autoincrement `seq` always reflects arrival order.
pub struct LibSqlLogStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlLogStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Execution log database opened");
        Ok(store)
    }

    /// In-memory database, mostly for tests.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn direction_to_str(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "incoming",
        Direction::Outgoing => "outgoing",
    }
}

fn str_to_direction(s: &str) -> Option<Direction> {
    match s {
        "incoming" => Some(Direction::Incoming),
        "outgoing" => Some(Direction::Outgoing),
        _ => None,
    }
}

fn status_to_str(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Success => "success",
        EntryStatus::Error => "error",
    }
}

fn str_to_status(s: &str) -> EntryStatus {
    match s {
        "error" => EntryStatus::Error,
        _ => EntryStatus::Success,
    }
}

/// Convert `Option<&str>` to a libsql value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_entry(row: &libsql::Row) -> Result<ExecutionLogEntry, DatabaseError> {
    let text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
    };
    let opt = |idx: i32| -> Option<String> { row.get::<String>(idx).ok() };

    let kind = text(1)?.parse().map_err(DatabaseError::Serialization)?;
    let channel = text(2)?.parse().map_err(DatabaseError::Serialization)?;

    Ok(ExecutionLogEntry {
        timestamp: parse_datetime(&text(0)?),
        kind,
        channel,
        recipient: text(3)?,
        direction: opt(4).as_deref().and_then(str_to_direction),
        status: str_to_status(&text(5)?),
        message: text(6)?,
        error: opt(7),
        provider_response: opt(8),
        original_content: opt(9),
        personalized_content: opt(10),
        trigger_type: opt(11),
        trigger_value: opt(12),
    })
}

const ENTRY_COLUMNS: &str = "timestamp, kind, channel, recipient, direction, status, message, \
     error, provider_response, original_content, personalized_content, trigger_type, trigger_value";

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ExecutionLogStore for LibSqlLogStore {
    async fn append(
        &self,
        workflow_id: Uuid,
        entry: ExecutionLogEntry,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO execution_logs (workflow_id, {ENTRY_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    workflow_id.to_string(),
                    entry.timestamp.to_rfc3339(),
                    entry.kind.as_str(),
                    entry.channel.as_str(),
                    entry.recipient.as_str(),
                    opt_text(entry.direction.map(direction_to_str)),
                    status_to_str(entry.status),
                    entry.message.as_str(),
                    opt_text(entry.error.as_deref()),
                    opt_text(entry.provider_response.as_deref()),
                    opt_text(entry.original_content.as_deref()),
                    opt_text(entry.personalized_content.as_deref()),
                    opt_text(entry.trigger_type.as_deref()),
                    opt_text(entry.trigger_value.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_log: {e}")))?;

        debug!(workflow_id = %workflow_id, kind = %entry.kind, "Execution log entry stored");
        Ok(())
    }

    async fn read(&self, workflow_id: Uuid) -> Result<Vec<ExecutionLogEntry>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM execution_logs WHERE workflow_id = ?1 ORDER BY seq"
                ),
                params![workflow_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("read_log: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("read_log: {e}")))?
        {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<usize, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let count = self
            .conn
            .execute(
                "DELETE FROM execution_logs WHERE workflow_id = ?1",
                params![workflow_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_log: {e}")))?;
        Ok(count as usize)
    }
}
