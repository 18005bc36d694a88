//! EventLog trait and store errors

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::event::{Event, Score};

/// Errors from storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Ordered per-subject event storage
///
/// Every queue is addressed by a storage key and ordered by score, with
/// insertion order breaking ties. A queue expires as a whole once no append
/// has refreshed it for the TTL of its latest event.
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
    /// Insert an event at `score` and refresh the queue's expiry to the
    /// event's TTL. Insertion and expiry refresh happen together.
    async fn append(&self, key: &str, score: Score, event: &Event) -> Result<(), StoreError>;

    /// Events with `min <= score <= max` in ascending order, at most `limit`.
    /// `min = None` means unbounded below.
    async fn range_by_score(
        &self,
        key: &str,
        min: Option<Score>,
        max: Score,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError>;

    /// Drop the oldest entries once the queue holds more than `2 * keep`,
    /// leaving the newest `keep`. Returns the number removed.
    async fn trim_by_rank(&self, key: &str, keep: usize) -> Result<usize, StoreError>;

    /// Locate an event by id within one queue
    async fn find_by_id(&self, key: &str, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Remove entries whose score is older than `now - ttl`. Returns the
    /// number removed.
    async fn expire_older_than(&self, key: &str, ttl: Duration) -> Result<usize, StoreError>;

    /// Number of live entries in a queue
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Drop whole queues whose expiry has passed. Returns the number removed.
    async fn purge_expired_queues(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Score cutoff for entries older than `ttl`
pub(crate) fn expiry_cutoff(ttl: Duration) -> Score {
    let ttl_micros = i64::try_from(ttl.as_micros()).unwrap_or(i64::MAX);
    chrono::Utc::now()
        .timestamp_micros()
        .saturating_sub(ttl_micros)
}
