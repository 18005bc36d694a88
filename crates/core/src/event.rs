//! Event model
//!
//! An [`Event`] is the atomic unit of notification. Its `timestamp` doubles as
//! the ordering key inside a subject queue; see [`Score`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::QueueError;

/// Open, type-specific event payload
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Ordering key of an event inside a subject queue (microseconds since epoch)
pub type Score = i64;

/// Entity type stamped on order events
pub const ORDER_ENTITY_TYPE: &str = "ORDER";

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CustomerOrderStatus,
    AdminNewOrder,
    AdminOrderUpdate,
    InventoryUpdate,
    PaymentStatus,
    SystemNotification,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        Self::CustomerOrderStatus,
        Self::AdminNewOrder,
        Self::AdminOrderUpdate,
        Self::InventoryUpdate,
        Self::PaymentStatus,
        Self::SystemNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerOrderStatus => "CUSTOMER_ORDER_STATUS",
            Self::AdminNewOrder => "ADMIN_NEW_ORDER",
            Self::AdminOrderUpdate => "ADMIN_ORDER_UPDATE",
            Self::InventoryUpdate => "INVENTORY_UPDATE",
            Self::PaymentStatus => "PAYMENT_STATUS",
            Self::SystemNotification => "SYSTEM_NOTIFICATION",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| QueueError::InvalidInput(format!("unknown event type: {s}")))
    }
}

/// Client-side effect hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    Refresh,
    FetchNew,
    UpdatePartial,
    Remove,
    NoAction,
}

impl EventAction {
    pub const ALL: [EventAction; 5] = [
        Self::Refresh,
        Self::FetchNew,
        Self::UpdatePartial,
        Self::Remove,
        Self::NoAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "REFRESH",
            Self::FetchNew => "FETCH_NEW",
            Self::UpdatePartial => "UPDATE_PARTIAL",
            Self::Remove => "REMOVE",
            Self::NoAction => "NO_ACTION",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| QueueError::InvalidInput(format!("unknown event action: {s}")))
    }
}

/// A published notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique id, also the client's resumption cursor
    #[serde(rename = "eventId")]
    pub id: Uuid,

    pub event_type: EventType,

    pub action: EventAction,

    /// Identifier of the affected domain object
    pub entity_id: String,

    /// Kind of the affected domain object (e.g. "ORDER")
    pub entity_type: String,

    /// Type-specific payload
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Metadata,

    /// Assignment time; also the ordering key
    pub timestamp: DateTime<Utc>,

    /// Retention in seconds
    pub ttl: u64,
}

impl Event {
    /// The ordering key of this event
    pub fn score(&self) -> Score {
        score_of(self.timestamp)
    }
}

/// Convert a timestamp to its ordering key
pub fn score_of(timestamp: DateTime<Utc>) -> Score {
    timestamp.timestamp_micros()
}
