//! Inbound processing: event normalization, workflow matching, delayed-send
//! scheduling and the execution engine that drives each matched pair.

pub mod matcher;
pub mod orchestrator;
pub mod scheduler;
pub mod types;

pub use matcher::{InboundMatcher, match_workflows};
pub use orchestrator::ExecutionEngine;
pub use scheduler::{CancelledSend, SendScheduler, SendTicket};
pub use types::{InboundEvent, InboundReport, PairOutcome, WorkflowOutcome};
