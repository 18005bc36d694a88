//! # Pulse Core
//!
//! Event queue and long-poll delivery engine for near-real-time notifications.
//!
//! ## Features
//!
//! - **Per-subject queues**: one ordered queue per user plus a shared admin queue
//! - **Bounded retention**: queues are trimmed by rank and expire when idle
//! - **Backpressured publishing**: background writes up to a slot limit, synchronous beyond it
//! - **Resumable polling**: clients resume from the last event id they saw
//! - **Long polling**: fixed-cadence re-reads until events arrive, a deadline passes or the caller leaves
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────┐
//! │    EventPublisher    │        │  PollResolver ◄── LongPollWaiter
//! │ (stamps id + score,  │        │ (cursor → score range,       │
//! │  WriteSlots / sync)  │        │  type filter, page metadata) │
//! └──────────┬───────────┘        └──────────────┬───────────────┘
//!            │ append + trim                     │ range + find
//!            ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          EventLog                            │
//! │       (InMemoryEventLog | PostgresEventLog: poll_events)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`NotificationService`] wires the pieces together behind one facade.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod publisher;
pub mod resolver;
pub mod service;
pub mod slots;
pub mod store;
pub mod subject;
pub mod waiter;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::QueueConfig;
    pub use crate::error::QueueError;
    pub use crate::event::{Event, EventAction, EventType, Metadata};
    pub use crate::publisher::{PublishOutcome, PublishRequest};
    pub use crate::service::{NotificationService, PollRequest, PollResponse};
    pub use crate::store::{EventLog, InMemoryEventLog, PostgresEventLog, StoreError};
    pub use crate::subject::SubjectKey;
}

// Re-export key types at crate root
pub use clock::{MonotonicClock, Reservation};
pub use config::QueueConfig;
pub use error::QueueError;
pub use event::{Event, EventAction, EventType, Metadata, Score};
pub use publisher::{EventPublisher, PublishOutcome, PublishRequest};
pub use resolver::{PollBatch, PollQuery, PollResolver};
pub use service::{NotificationService, PollRequest, PollResponse};
pub use slots::WriteSlots;
pub use store::{EventLog, InMemoryEventLog, PostgresEventLog, StoreError};
pub use subject::SubjectKey;
pub use waiter::{LongPollWaiter, WaitOutcome};
