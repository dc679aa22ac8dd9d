//! Workflow definitions, delay parsing and the active-workflow registry.

pub mod delay;
pub mod model;
pub mod registry;

pub use delay::parse_delay;
pub use model::{
    Action, Channel, ChannelMessage, Contact, Owner, Trigger, Workflow, WorkflowStatus,
};
pub use registry::{InMemoryRegistry, WorkflowRegistry};
