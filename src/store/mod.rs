//! Persistence for execution logs: in-memory and libSQL backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlLogStore;
pub use memory::InMemoryLogStore;
pub use traits::ExecutionLogStore;
