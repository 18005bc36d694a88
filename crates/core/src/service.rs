//! Notification service
//!
//! Facade over the publisher, resolver and long-poll waiter. Transports hold
//! one [`NotificationService`] and call into it; no transport framing leaks
//! in here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::clock::MonotonicClock;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::event::{Event, EventType, Metadata};
use crate::publisher::{EventPublisher, PublishOutcome, PublishRequest};
use crate::resolver::{PollBatch, PollQuery, PollResolver};
use crate::store::EventLog;
use crate::subject::SubjectKey;
use crate::waiter::{LongPollWaiter, WaitOutcome};

/// A poll as issued by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub subject: SubjectKey,
    pub event_type: Option<EventType>,
    pub last_event_id: Option<String>,
    pub long_poll: bool,
}

impl PollRequest {
    pub fn new(subject: SubjectKey) -> Self {
        Self {
            subject,
            event_type: None,
            last_event_id: None,
            long_poll: false,
        }
    }

    pub fn with_event_type(mut self, event_type: Option<EventType>) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_last_event_id(mut self, last_event_id: Option<String>) -> Self {
        self.last_event_id = last_event_id;
        self
    }

    pub fn with_long_poll(mut self, long_poll: bool) -> Self {
        self.long_poll = long_poll;
        self
    }
}

/// Poll result returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub events: Vec<Event>,
    /// Cursor for the next poll; empty when the client has none yet
    pub last_event_id: String,
    /// Suggested delay before the next poll, in milliseconds
    pub poll_interval: u64,
    pub has_more: bool,
}

/// Event queue and long-poll engine
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pulse_core::{InMemoryEventLog, NotificationService, PollRequest, QueueConfig, SubjectKey};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), pulse_core::QueueError> {
/// let service = NotificationService::new(Arc::new(InMemoryEventLog::new()), QueueConfig::default());
/// service.publish_order_status_change("O1", "U1", "SHIPPED").await?;
///
/// let request = PollRequest::new(SubjectKey::user("U1"));
/// let response = service.poll_events(request, &CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct NotificationService {
    config: QueueConfig,
    store: Arc<dyn EventLog>,
    publisher: EventPublisher,
    resolver: PollResolver,
    waiter: LongPollWaiter,
}

impl NotificationService {
    pub fn new(store: Arc<dyn EventLog>, config: QueueConfig) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        let publisher = EventPublisher::new(store.clone(), clock.clone(), &config);
        let resolver = PollResolver::new(store.clone(), clock, config.default_ttl);
        let waiter = LongPollWaiter::from_config(&config);

        info!(
            max_page_size = config.max_page_size,
            worker_pool_size = config.worker_pool_size,
            long_poll_timeout_ms = config.long_poll_timeout.as_millis() as u64,
            "Notification service created"
        );

        Self {
            config,
            store,
            publisher,
            resolver,
            waiter,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, QueueError> {
        self.publisher.publish(request).await
    }

    pub async fn publish_order_status_change(
        &self,
        order_id: &str,
        user_id: &str,
        new_status: &str,
    ) -> Result<PublishOutcome, QueueError> {
        self.publisher
            .publish_order_status_change(order_id, user_id, new_status)
            .await
    }

    pub async fn publish_new_order(
        &self,
        order_id: &str,
        customer_name: &str,
        total_amount: &str,
    ) -> Result<PublishOutcome, QueueError> {
        self.publisher
            .publish_new_order(order_id, customer_name, total_amount)
            .await
    }

    pub async fn publish_order_update(
        &self,
        order_id: &str,
        update_type: &str,
        details: Option<Metadata>,
    ) -> Result<PublishOutcome, QueueError> {
        self.publisher
            .publish_order_update(order_id, update_type, details)
            .await
    }

    /// Serve one poll, blocking up to the long-poll timeout when requested
    ///
    /// A long poll that times out returns an empty page with the caller's
    /// cursor unchanged. Cancelling `cancel` ends a long poll early with
    /// [`QueueError::Cancelled`].
    #[instrument(skip(self, cancel), fields(subject = %request.subject, long_poll = request.long_poll))]
    pub async fn poll_events(
        &self,
        request: PollRequest,
        cancel: &CancellationToken,
    ) -> Result<PollResponse, QueueError> {
        let query = PollQuery::new(request.subject, self.config.max_page_size)
            .with_event_type(request.event_type)
            .with_cursor(request.last_event_id);

        let batch = if request.long_poll {
            let resolver = self.resolver.clone();
            let fetch_query = query.clone();
            let fetch = move || {
                let resolver = resolver.clone();
                let query = fetch_query.clone();
                async move { resolver.resolve(&query).await }
            };

            match self.waiter.wait(fetch, cancel).await? {
                WaitOutcome::Ready(batch) => batch,
                WaitOutcome::TimedOut => {
                    debug!("Long poll timed out with no new events");
                    PollBatch::empty(query.cursor)
                }
            }
        } else {
            self.resolver.resolve(&query).await?
        };

        Ok(self.build_response(batch, request.long_poll))
    }

    /// Shape a batch into the client response
    pub fn build_response(&self, batch: PollBatch, long_poll: bool) -> PollResponse {
        let poll_interval = if long_poll {
            self.config.long_poll_interval
        } else {
            self.config.short_poll_interval
        };

        PollResponse {
            events: batch.events,
            last_event_id: batch.next_cursor.unwrap_or_default(),
            poll_interval: poll_interval.as_millis() as u64,
            has_more: batch.has_more,
        }
    }

    /// Probe the store within the health-check budget
    pub async fn check_health(&self) -> Result<(), QueueError> {
        let budget = self.config.health_check_timeout;
        match tokio::time::timeout(budget, self.store.ping()).await {
            Ok(result) => result.map_err(QueueError::from),
            Err(_) => {
                warn!(timeout_ms = budget.as_millis() as u64, "Health check timed out");
                Err(QueueError::HealthCheckTimeout(budget))
            }
        }
    }

    /// Drain in-flight background publishes
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.publisher.shutdown(self.config.shutdown_timeout).await
    }
}
