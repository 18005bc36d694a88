//! Cursor resolution
//!
//! Turns a subject, an optional resumption cursor and an optional type filter
//! into one bounded score-range read.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::MonotonicClock;
use crate::error::QueueError;
use crate::event::{Event, EventType, Score};
use crate::store::EventLog;
use crate::subject::SubjectKey;

/// Over-fetch factor for type-filtered reads
const TYPE_FILTER_OVERFETCH: usize = 2;

/// One poll's read parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollQuery {
    pub subject: SubjectKey,
    pub event_type: Option<EventType>,
    /// Last event id seen by the client; empty is the same as absent
    pub cursor: Option<String>,
    pub limit: usize,
}

impl PollQuery {
    pub fn new(subject: SubjectKey, limit: usize) -> Self {
        Self {
            subject,
            event_type: None,
            cursor: None,
            limit,
        }
    }

    pub fn with_event_type(mut self, event_type: Option<EventType>) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }
}

/// Result of a single read
#[derive(Debug, Clone, PartialEq)]
pub struct PollBatch {
    pub events: Vec<Event>,
    /// Id of the last event returned, or the prior cursor when empty
    pub next_cursor: Option<String>,
    /// Whether the batch filled the page
    pub has_more: bool,
}

impl PollBatch {
    /// An empty batch that leaves the client's cursor where it was
    pub fn empty(cursor: Option<String>) -> Self {
        Self {
            events: Vec::new(),
            next_cursor: cursor,
            has_more: false,
        }
    }

    fn from_events(events: Vec<Event>, cursor: Option<String>, limit: usize) -> Self {
        let next_cursor = events
            .last()
            .map(|e| e.id.to_string())
            .or(cursor);
        let has_more = limit > 0 && events.len() == limit;
        Self {
            events,
            next_cursor,
            has_more,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Resolves poll queries against the store
#[derive(Clone)]
pub struct PollResolver {
    store: Arc<dyn EventLog>,
    clock: Arc<MonotonicClock>,
    retention: Duration,
}

impl PollResolver {
    pub fn new(store: Arc<dyn EventLog>, clock: Arc<MonotonicClock>, retention: Duration) -> Self {
        Self {
            store,
            clock,
            retention,
        }
    }

    /// Read the next batch for a query
    ///
    /// An unknown, malformed or expired cursor reads from the start of the
    /// queue. A successful read schedules a background sweep of entries older
    /// than the retention window.
    pub async fn resolve(&self, query: &PollQuery) -> Result<PollBatch, QueueError> {
        let key = query.subject.storage_key();
        let cursor = query.cursor.clone().filter(|c| !c.is_empty());

        let min = match cursor.as_deref() {
            Some(cursor) => self.lower_bound(&key, cursor).await?,
            None => None,
        };
        let max = self.clock.read_horizon();

        let events = match query.event_type {
            None => self.store.range_by_score(&key, min, max, query.limit).await?,
            Some(event_type) => {
                let fetch = query.limit.saturating_mul(TYPE_FILTER_OVERFETCH);
                let mut events = self.store.range_by_score(&key, min, max, fetch).await?;
                events.retain(|e| e.event_type == event_type);
                events.truncate(query.limit);
                events
            }
        };

        debug!(
            %key,
            count = events.len(),
            has_cursor = cursor.is_some(),
            "Resolved poll batch"
        );

        self.schedule_sweep(key);
        Ok(PollBatch::from_events(events, cursor, query.limit))
    }

    async fn lower_bound(&self, key: &str, cursor: &str) -> Result<Option<Score>, QueueError> {
        let Ok(id) = Uuid::parse_str(cursor) else {
            debug!(%key, cursor, "Ignoring malformed cursor");
            return Ok(None);
        };

        Ok(self
            .store
            .find_by_id(key, id)
            .await?
            .map(|event| event.score().saturating_add(1)))
    }

    fn schedule_sweep(&self, key: String) {
        let store = self.store.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            match store.expire_older_than(&key, retention).await {
                Ok(0) => {}
                Ok(removed) => debug!(%key, removed, "Swept expired events"),
                Err(e) => warn!(%key, error = %e, "Failed to sweep expired events"),
            }
        });
    }
}
