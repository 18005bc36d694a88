//! PostgreSQL implementation of EventLog
//!
//! Queues live in two tables:
//! - `poll_queues`: one row per subject key with its expiry deadline
//! - `poll_events`: entries keyed by (subject_key, score, seq)
//!
//! Appends run in a transaction so the insert and the expiry refresh land
//! together. A queue whose deadline has passed is invisible to reads and is
//! emptied by the next append or by [`EventLog::purge_expired_queues`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::log::{expiry_cutoff, EventLog, StoreError};
use crate::event::{Event, Score};

/// PostgreSQL implementation of EventLog
///
/// # Example
///
/// ```ignore
/// use pulse_core::PostgresEventLog;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/pulse").await?;
/// let store = PostgresEventLog::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                StoreError::Database(e.to_string())
            })
    }
}

fn map_db_error(op: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        error!("Failed to {}: {}", op, e);
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl EventLog for PostgresEventLog {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn append(&self, key: &str, score: Score, event: &Event) -> Result<(), StoreError> {
        let payload = serde_json::to_value(event)?;
        let ttl_secs = i64::try_from(event.ttl).unwrap_or(i64::MAX);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(map_db_error("begin append"))?;

        // Entries of an expired queue must not resurface when it is revived
        sqlx::query(
            r#"
            DELETE FROM poll_events
            WHERE subject_key = $1
              AND EXISTS (
                  SELECT 1 FROM poll_queues
                  WHERE subject_key = $1 AND expires_at <= now()
              )
            "#,
        )
        .bind(key)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error("clear expired queue"))?;

        sqlx::query(
            r#"
            INSERT INTO poll_queues (subject_key, expires_at)
            VALUES ($1, now() + make_interval(secs => $2))
            ON CONFLICT (subject_key) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(ttl_secs as f64)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error("refresh queue expiry"))?;

        sqlx::query(
            r#"
            INSERT INTO poll_events (subject_key, event_id, score, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(key)
        .bind(event.id)
        .bind(score)
        .bind(&payload)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error("insert event"))?;

        tx.commit().await.map_err(map_db_error("commit append"))?;

        debug!(key, score, "appended event");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn range_by_score(
        &self,
        key: &str,
        min: Option<Score>,
        max: Score,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT e.payload
            FROM poll_events e
            JOIN poll_queues q ON q.subject_key = e.subject_key
            WHERE e.subject_key = $1
              AND q.expires_at > now()
              AND e.score >= $2
              AND e.score <= $3
            ORDER BY e.score, e.seq
            LIMIT $4
            "#,
        )
        .bind(key)
        .bind(min.unwrap_or(Score::MIN))
        .bind(max)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error("read events by score"))?;

        rows.into_iter()
            .map(|row| {
                let payload: serde_json::Value = row.get("payload");
                serde_json::from_value(payload).map_err(StoreError::from)
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn trim_by_rank(&self, key: &str, keep: usize) -> Result<usize, StoreError> {
        let keep = clamp_limit(keep);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(map_db_error("begin trim"))?;

        // Serialize trims of one queue on its queue row
        let locked = sqlx::query("SELECT 1 FROM poll_queues WHERE subject_key = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error("lock queue"))?;
        if locked.is_none() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM poll_events
            WHERE seq IN (
                SELECT seq FROM poll_events
                WHERE subject_key = $1
                ORDER BY score DESC, seq DESC
                OFFSET $2
            )
              AND (SELECT count(*) FROM poll_events WHERE subject_key = $1) > $3
            "#,
        )
        .bind(key)
        .bind(keep)
        .bind(keep.saturating_mul(2))
        .execute(&mut *tx)
        .await
        .map_err(map_db_error("trim queue"))?;

        tx.commit().await.map_err(map_db_error("commit trim"))?;

        let removed = result.rows_affected() as usize;
        if removed > 0 {
            debug!(key, removed, "trimmed queue");
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, key: &str, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT e.payload
            FROM poll_events e
            JOIN poll_queues q ON q.subject_key = e.subject_key
            WHERE e.subject_key = $1
              AND e.event_id = $2
              AND q.expires_at > now()
            LIMIT 1
            "#,
        )
        .bind(key)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error("find event"))?;

        row.map(|row| {
            let payload: serde_json::Value = row.get("payload");
            serde_json::from_value(payload).map_err(StoreError::from)
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn expire_older_than(&self, key: &str, ttl: Duration) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM poll_events WHERE subject_key = $1 AND score < $2")
            .bind(key)
            .bind(expiry_cutoff(ttl))
            .execute(&self.pool)
            .await
            .map_err(map_db_error("expire old events"))?;

        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self))]
    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM poll_events e
            JOIN poll_queues q ON q.subject_key = e.subject_key
            WHERE e.subject_key = $1 AND q.expires_at > now()
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error("count queue"))?;

        let count: i64 = row.get("count");
        Ok(count.max(0) as usize)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_error("ping database"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge_expired_queues(&self) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM poll_queues WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(map_db_error("purge expired queues"))?;

        let purged = result.rows_affected() as usize;
        if purged > 0 {
            debug!(purged, "purged expired queues");
        }
        Ok(purged)
    }
}
