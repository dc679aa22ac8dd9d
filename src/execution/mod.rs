//! Execution history: log entries and display-side session grouping.

pub mod log;
pub mod sessions;

pub use log::{Direction, EntryKind, EntryStatus, ExecutionLogEntry};
pub use sessions::{Session, SessionStrategy, group_sessions};
