//! Integration tests for PostgresEventLog
//!
//! Run with: cargo test -p pulse-core --test postgres_integration_test -- --test-threads=1
//!
//! Requirements:
//! - PostgreSQL reachable at DATABASE_URL (tests are skipped when unset)
//! - Migrations are applied by the tests themselves

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use pulse_core::{Event, EventAction, EventLog, EventType, Metadata, PostgresEventLog};

/// Connect to the test database, or `None` when DATABASE_URL is unset
async fn create_test_store() -> Option<PostgresEventLog> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to PostgreSQL. Check DATABASE_URL.");
    let store = PostgresEventLog::new(pool);
    store.migrate().await.expect("Failed to run migrations");
    Some(store)
}

/// Unique key per test run so tests don't see each other's rows
fn test_key(name: &str) -> String {
    format!("poll:test:{name}:{}", Uuid::now_v7())
}

async fn cleanup(store: &PostgresEventLog, key: &str) {
    sqlx::query("DELETE FROM poll_queues WHERE subject_key = $1")
        .bind(key)
        .execute(store.pool())
        .await
        .ok();
}

fn event_at(micros: i64, ttl: u64) -> Event {
    Event {
        id: Uuid::now_v7(),
        event_type: EventType::AdminNewOrder,
        action: EventAction::FetchNew,
        entity_id: format!("O{micros}"),
        entity_type: "ORDER".into(),
        metadata: Metadata::new(),
        timestamp: chrono::DateTime::from_timestamp_micros(micros).unwrap(),
        ttl,
    }
}

#[tokio::test]
async fn test_append_range_and_find() {
    let Some(store) = create_test_store().await else {
        return;
    };
    let key = test_key("range");
    let base = Utc::now().timestamp_micros();

    let events: Vec<_> = (0..3).map(|i| event_at(base + i, 300)).collect();
    for e in &events {
        store.append(&key, e.score(), e).await.unwrap();
    }

    let all = store.range_by_score(&key, None, base + 10, 50).await.unwrap();
    assert_eq!(all, events);

    let found = store.find_by_id(&key, events[1].id).await.unwrap().unwrap();
    assert_eq!(found, events[1]);

    let tail = store
        .range_by_score(&key, Some(found.score() + 1), base + 10, 50)
        .await
        .unwrap();
    assert_eq!(tail, events[2..]);

    assert!(store.find_by_id(&key, Uuid::now_v7()).await.unwrap().is_none());
    cleanup(&store, &key).await;
}

#[tokio::test]
async fn test_trim_by_rank() {
    let Some(store) = create_test_store().await else {
        return;
    };
    let key = test_key("trim");
    let base = Utc::now().timestamp_micros();

    let events: Vec<_> = (0..7).map(|i| event_at(base + i, 300)).collect();
    for e in &events {
        store.append(&key, e.score(), e).await.unwrap();
    }

    assert_eq!(store.trim_by_rank(&key, 3).await.unwrap(), 4);
    let remaining = store.range_by_score(&key, None, base + 10, 50).await.unwrap();
    assert_eq!(remaining, events[4..]);
    cleanup(&store, &key).await;
}

#[tokio::test]
async fn test_concurrent_trims_keep_newest() {
    let Some(store) = create_test_store().await else {
        return;
    };
    let key = test_key("trim-race");
    let base = Utc::now().timestamp_micros();

    let events: Vec<_> = (0..12).map(|i| event_at(base + i, 300)).collect();
    for e in &events {
        store.append(&key, e.score(), e).await.unwrap();
    }

    let trims: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.trim_by_rank(&key, 3).await.unwrap() })
        })
        .collect();
    let mut removed = 0;
    for trim in trims {
        removed += trim.await.unwrap();
    }

    assert_eq!(removed, 9);
    let remaining = store.range_by_score(&key, None, base + 20, 50).await.unwrap();
    assert_eq!(remaining, events[9..]);
    cleanup(&store, &key).await;
}

#[tokio::test]
async fn test_expiry() {
    let Some(store) = create_test_store().await else {
        return;
    };
    let key = test_key("expiry");
    let now = Utc::now().timestamp_micros();

    let stale = event_at(now - 600_000_000, 300);
    let fresh = event_at(now, 300);
    store.append(&key, stale.score(), &stale).await.unwrap();
    store.append(&key, fresh.score(), &fresh).await.unwrap();

    let removed = store
        .expire_older_than(&key, Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.len(&key).await.unwrap(), 1);

    // A zero TTL makes the whole queue invisible at once
    let gone = test_key("gone");
    let event = event_at(now, 0);
    store.append(&gone, event.score(), &event).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.len(&gone).await.unwrap(), 0);
    assert!(store.purge_expired_queues().await.unwrap() >= 1);

    cleanup(&store, &key).await;
}

#[tokio::test]
async fn test_ping() {
    let Some(store) = create_test_store().await else {
        return;
    };
    store.ping().await.unwrap();
}
