//! Error types for replyflow.

use std::time::Duration;

use uuid::Uuid;

use crate::workflow::Channel;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage errors for the execution log and workflow registry.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid recipient for {channel}: {recipient}")]
    InvalidRecipient { channel: Channel, recipient: String },

    #[error("No transport registered for channel {channel}")]
    NoTransport { channel: Channel },

    #[error("Failed to send on channel {channel}: {reason}")]
    SendFailed { channel: Channel, reason: String },

    #[error("Send on channel {channel} timed out after {timeout:?}")]
    Timeout { channel: Channel, timeout: Duration },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Workflow definition and lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow {id} not found")]
    NotFound { id: Uuid },

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),
}
