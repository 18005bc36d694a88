//! Ordered event storage
//!
//! Subject queues are kept in an [`EventLog`]: an ordered set per key with
//! score-range reads, rank trimming and whole-queue expiry. Two backends are
//! provided:
//! - [`InMemoryEventLog`]: process-local, for development and tests
//! - [`PostgresEventLog`]: durable, shared between server instances

mod log;
mod memory;
mod postgres;

pub use log::{EventLog, StoreError};
pub use memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;
