// Background store maintenance

use std::sync::Arc;
use std::time::Duration;

use pulse_core::EventLog;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically drop queues whose retention has lapsed, until cancelled
pub async fn purge_loop(store: Arc<dyn EventLog>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                match store.purge_expired_queues().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Purged expired queues"),
                    Err(e) => tracing::warn!(error = %e, "Failed to purge expired queues"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{Event, EventAction, EventType, InMemoryEventLog, Metadata};

    fn event_with_ttl(ttl: u64) -> Event {
        Event {
            id: uuid::Uuid::now_v7(),
            event_type: EventType::CustomerOrderStatus,
            action: EventAction::Refresh,
            entity_id: "O1".into(),
            entity_type: "ORDER".into(),
            metadata: Metadata::new(),
            timestamp: chrono::Utc::now(),
            ttl,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_loop_drops_expired_queues() {
        let store = Arc::new(InMemoryEventLog::new());
        let expired = event_with_ttl(0);
        let live = event_with_ttl(300);
        store
            .append("poll:user:gone", expired.score(), &expired)
            .await
            .unwrap();
        store
            .append("poll:user:here", live.score(), &live)
            .await
            .unwrap();
        assert_eq!(store.stored_queue_count(), 2);

        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(purge_loop(
            store.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.stored_queue_count(), 1);
        assert_eq!(store.subject_count(), 1);

        cancel.cancel();
        sweeper.await.unwrap();
    }
}
