//! Subject addressing
//!
//! A subject owns one ordered queue. There is one queue per user plus a single
//! shared admin queue.

use std::fmt;

use crate::event::EventType;

/// Storage key prefix for per-user queues
pub const USER_KEY_PREFIX: &str = "poll:user:";

/// Storage key of the shared admin queue
pub const ADMIN_KEY: &str = "poll:admin:events";

/// Recipient of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubjectKey {
    User(String),
    Admin,
}

impl SubjectKey {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User(user_id.into())
    }

    /// User queue when a non-empty user id is given, admin queue otherwise
    pub fn for_recipient(user_id: Option<&str>) -> Self {
        match user_id {
            Some(id) if !id.is_empty() => Self::user(id),
            _ => Self::Admin,
        }
    }

    /// Queue consulted by a type-filtered poll
    ///
    /// Only customer order status events live in user queues; every other
    /// type is read from the admin queue.
    pub fn for_type_filter(event_type: EventType, user_id: Option<&str>) -> Self {
        match (event_type, user_id) {
            (EventType::CustomerOrderStatus, Some(id)) if !id.is_empty() => Self::user(id),
            _ => Self::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Key under which the queue is stored
    pub fn storage_key(&self) -> String {
        match self {
            Self::User(id) => format!("{USER_KEY_PREFIX}{id}"),
            Self::Admin => ADMIN_KEY.to_string(),
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{USER_KEY_PREFIX}{id}"),
            Self::Admin => f.write_str(ADMIN_KEY),
        }
    }
}
