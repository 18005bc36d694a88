//! In-memory implementation of EventLog for development and testing

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::log::{expiry_cutoff, EventLog, StoreError};
use crate::event::{Event, Score};

/// One subject queue ordered by (score, insertion sequence)
struct SubjectQueue {
    entries: BTreeMap<(Score, u64), Event>,
    expires_at: DateTime<Utc>,
}

impl SubjectQueue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// In-memory implementation of EventLog
///
/// Provides the same ordering and expiry semantics as the PostgreSQL
/// implementation. Expired queues are treated as absent on read and dropped
/// on the next write or by [`EventLog::purge_expired_queues`].
///
/// # Example
///
/// ```
/// use pulse_core::InMemoryEventLog;
///
/// let store = InMemoryEventLog::new();
/// assert_eq!(store.subject_count(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryEventLog {
    queues: RwLock<HashMap<String, SubjectQueue>>,
    insert_seq: AtomicU64,
}

impl InMemoryEventLog {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subject queues
    pub fn subject_count(&self) -> usize {
        let now = Utc::now();
        self.queues
            .read()
            .values()
            .filter(|q| !q.is_expired(now))
            .count()
    }

    /// Drop every queue
    pub fn clear(&self) {
        self.queues.write().clear();
    }

    /// Number of stored queues, including expired ones not yet purged
    pub fn stored_queue_count(&self) -> usize {
        self.queues.read().len()
    }
}

fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, key: &str, score: Score, event: &Event) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = expiry_after(now, event.ttl);
        let seq = self.insert_seq.fetch_add(1, Ordering::Relaxed);

        let mut queues = self.queues.write();
        let queue = queues
            .entry(key.to_string())
            .or_insert_with(|| SubjectQueue {
                entries: BTreeMap::new(),
                expires_at,
            });
        if queue.is_expired(now) {
            queue.entries.clear();
        }
        queue.entries.insert((score, seq), event.clone());
        queue.expires_at = expires_at;
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        min: Option<Score>,
        max: Score,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        let min = min.unwrap_or(Score::MIN);
        if min > max || limit == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let queues = self.queues.read();
        let Some(queue) = queues.get(key).filter(|q| !q.is_expired(now)) else {
            return Ok(Vec::new());
        };

        Ok(queue
            .entries
            .range((min, 0)..=(max, u64::MAX))
            .take(limit)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn trim_by_rank(&self, key: &str, keep: usize) -> Result<usize, StoreError> {
        let mut queues = self.queues.write();
        let Some(queue) = queues.get_mut(key) else {
            return Ok(0);
        };

        let len = queue.entries.len();
        if len <= keep.saturating_mul(2) {
            return Ok(0);
        }

        let excess = len - keep;
        for _ in 0..excess {
            queue.entries.pop_first();
        }
        Ok(excess)
    }

    async fn find_by_id(&self, key: &str, id: Uuid) -> Result<Option<Event>, StoreError> {
        let now = Utc::now();
        let queues = self.queues.read();
        Ok(queues
            .get(key)
            .filter(|q| !q.is_expired(now))
            .and_then(|q| q.entries.values().find(|e| e.id == id).cloned()))
    }

    async fn expire_older_than(&self, key: &str, ttl: Duration) -> Result<usize, StoreError> {
        let cutoff = expiry_cutoff(ttl);
        let mut queues = self.queues.write();
        let Some(queue) = queues.get_mut(key) else {
            return Ok(0);
        };

        let before = queue.entries.len();
        queue.entries = queue.entries.split_off(&(cutoff, 0));
        Ok(before - queue.entries.len())
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let now = Utc::now();
        Ok(self
            .queues
            .read()
            .get(key)
            .filter(|q| !q.is_expired(now))
            .map_or(0, |q| q.entries.len()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn purge_expired_queues(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut queues = self.queues.write();
        let before = queues.len();
        queues.retain(|_, q| !q.is_expired(now));
        Ok(before - queues.len())
    }
}
