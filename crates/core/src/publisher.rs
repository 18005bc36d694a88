//! Event publishing
//!
//! The publisher stamps an [`Event`] with a fresh id and a monotonic
//! timestamp, picks its subject queue and submits the write. Writes go to a
//! background task while a [`WriteSlots`] slot is free, and run on the
//! caller's task otherwise.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::{MonotonicClock, Reservation};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::event::{Event, EventAction, EventType, Metadata, ORDER_ENTITY_TYPE};
use crate::slots::WriteSlots;
use crate::store::{EventLog, StoreError};
use crate::subject::SubjectKey;

/// Generic publish input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub event_type: EventType,
    pub action: EventAction,
    pub entity_id: String,
    pub entity_type: String,
    /// Recipient user; the admin queue when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

/// How a publish was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to a background write; store failures are logged, not returned
    Dispatched,
    /// Written synchronously on the caller's task
    Written,
}

/// Builds events and submits them to the store
pub struct EventPublisher {
    store: Arc<dyn EventLog>,
    clock: Arc<MonotonicClock>,
    slots: WriteSlots,
    tracker: TaskTracker,
    default_ttl_secs: u64,
    trim_keep: usize,
}

impl EventPublisher {
    pub fn new(store: Arc<dyn EventLog>, clock: Arc<MonotonicClock>, config: &QueueConfig) -> Self {
        Self {
            store,
            clock,
            slots: WriteSlots::new(config.worker_pool_size),
            tracker: TaskTracker::new(),
            default_ttl_secs: config.default_ttl.as_secs(),
            trim_keep: config.max_page_size,
        }
    }

    /// Publish an arbitrary event
    #[instrument(skip(self, request), fields(event_type = %request.event_type))]
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, QueueError> {
        require_non_empty("entityId", &request.entity_id)?;
        require_non_empty("entityType", &request.entity_type)?;

        let subject = SubjectKey::for_recipient(request.user_id.as_deref());
        let (event, stamp) = self.stamp(
            request.event_type,
            request.action,
            request.entity_id,
            request.entity_type,
            request.metadata,
        );
        self.submit(subject, event, stamp).await
    }

    /// Notify a customer that one of their orders changed status
    #[instrument(skip(self))]
    pub async fn publish_order_status_change(
        &self,
        order_id: &str,
        user_id: &str,
        new_status: &str,
    ) -> Result<PublishOutcome, QueueError> {
        require_non_empty("orderId", order_id)?;
        require_non_empty("userId", user_id)?;

        let metadata = object(json!({
            "status": new_status,
            "orderId": order_id,
        }));
        let (event, stamp) = self.stamp(
            EventType::CustomerOrderStatus,
            EventAction::Refresh,
            order_id.to_string(),
            ORDER_ENTITY_TYPE.to_string(),
            metadata,
        );
        self.submit(SubjectKey::user(user_id), event, stamp).await
    }

    /// Notify admins of a newly placed order
    #[instrument(skip(self))]
    pub async fn publish_new_order(
        &self,
        order_id: &str,
        customer_name: &str,
        total_amount: &str,
    ) -> Result<PublishOutcome, QueueError> {
        require_non_empty("orderId", order_id)?;

        let metadata = object(json!({
            "orderId": order_id,
            "customerName": customer_name,
            "totalAmount": total_amount,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }));
        let (event, stamp) = self.stamp(
            EventType::AdminNewOrder,
            EventAction::FetchNew,
            order_id.to_string(),
            ORDER_ENTITY_TYPE.to_string(),
            metadata,
        );
        self.submit(SubjectKey::Admin, event, stamp).await
    }

    /// Notify admins of a change to an existing order
    #[instrument(skip(self, details))]
    pub async fn publish_order_update(
        &self,
        order_id: &str,
        update_type: &str,
        details: Option<Metadata>,
    ) -> Result<PublishOutcome, QueueError> {
        require_non_empty("orderId", order_id)?;

        let mut metadata = details.unwrap_or_default();
        metadata.insert("updateType".into(), json!(update_type));
        metadata.insert("orderId".into(), json!(order_id));

        let (event, stamp) = self.stamp(
            EventType::AdminOrderUpdate,
            EventAction::UpdatePartial,
            order_id.to_string(),
            ORDER_ENTITY_TYPE.to_string(),
            metadata,
        );
        self.submit(SubjectKey::Admin, event, stamp).await
    }

    /// Number of background writes in flight
    pub fn in_flight(&self) -> usize {
        self.slots.in_flight()
    }

    /// Stop dispatching background writes and wait for those in flight
    ///
    /// Publishes issued after this call are written synchronously.
    pub async fn shutdown(&self, timeout: std::time::Duration) -> Result<(), QueueError> {
        info!(in_flight = self.in_flight(), "Draining background publishes");
        self.slots.close();
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("All background publishes completed");
                Ok(())
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "Shutdown timeout reached with publishes in flight"
                );
                Err(QueueError::ShutdownTimeout)
            }
        }
    }

    fn stamp(
        &self,
        event_type: EventType,
        action: EventAction,
        entity_id: String,
        entity_type: String,
        metadata: Metadata,
    ) -> (Event, Reservation) {
        let stamp = self.clock.reserve();
        let event = Event {
            id: Uuid::now_v7(),
            event_type,
            action,
            entity_id,
            entity_type,
            metadata,
            timestamp: stamp.timestamp(),
            ttl: self.default_ttl_secs,
        };
        (event, stamp)
    }

    async fn submit(
        &self,
        subject: SubjectKey,
        event: Event,
        stamp: Reservation,
    ) -> Result<PublishOutcome, QueueError> {
        let key = subject.storage_key();

        let Some(slot) = self.slots.try_acquire() else {
            debug!(%key, event_id = %event.id, "No write slot free, writing synchronously");
            write_event(self.store.as_ref(), &key, &event, stamp, self.trim_keep).await?;
            return Ok(PublishOutcome::Written);
        };

        let store = self.store.clone();
        let keep = self.trim_keep;
        self.tracker.spawn(async move {
            let _slot = slot;
            if let Err(e) = write_event(store.as_ref(), &key, &event, stamp, keep).await {
                error!(%key, event_id = %event.id, error = %e, "Failed to save event");
            }
        });
        Ok(PublishOutcome::Dispatched)
    }
}

/// Append an event and trim its queue
///
/// The timestamp is released as soon as the append returns. A trim failure
/// does not fail the write.
async fn write_event(
    store: &dyn EventLog,
    key: &str,
    event: &Event,
    stamp: Reservation,
    keep: usize,
) -> Result<(), StoreError> {
    let appended = store.append(key, stamp.score(), event).await;
    drop(stamp);
    appended?;
    debug!(%key, event_id = %event.id, event_type = %event.event_type, "Saved event");

    if let Err(e) = store.trim_by_rank(key, keep).await {
        warn!(%key, error = %e, "Failed to trim queue");
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), QueueError> {
    if value.trim().is_empty() {
        return Err(QueueError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn object(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}
