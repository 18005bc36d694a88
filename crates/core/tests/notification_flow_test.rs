//! End-to-end queue behavior against the in-memory store
//!
//! Run with: cargo test -p pulse-core --test notification_flow_test

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use pulse_core::prelude::*;

fn service_with(config: QueueConfig) -> (Arc<InMemoryEventLog>, Arc<NotificationService>) {
    let store = Arc::new(InMemoryEventLog::new());
    let service = Arc::new(NotificationService::new(store.clone(), config));
    (store, service)
}

/// Config whose background writes are disabled so every publish is visible on return
async fn synchronous_service(
    config: QueueConfig,
) -> (Arc<InMemoryEventLog>, Arc<NotificationService>) {
    let (store, service) = service_with(config);
    service.shutdown().await.unwrap();
    (store, service)
}

#[test_log::test(tokio::test)]
async fn test_order_status_change_reaches_user() {
    let (_store, service) = service_with(QueueConfig::default());

    service
        .publish_order_status_change("O1", "U1", "SHIPPED")
        .await
        .unwrap();
    service.shutdown().await.unwrap();

    let response = service
        .poll_events(PollRequest::new(SubjectKey::user("U1")), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.events.len(), 1);
    let event = &response.events[0];
    assert_eq!(event.event_type, EventType::CustomerOrderStatus);
    assert_eq!(event.action, EventAction::Refresh);
    assert_eq!(event.entity_id, "O1");
    assert_eq!(event.metadata["status"], json!("SHIPPED"));
    assert_eq!(event.metadata["orderId"], json!("O1"));
    assert_eq!(response.last_event_id, event.id.to_string());
    assert!(!response.has_more);
    assert_eq!(response.poll_interval, 5_000);

    // Other users see nothing
    let response = service
        .poll_events(PollRequest::new(SubjectKey::user("U2")), &CancellationToken::new())
        .await
        .unwrap();
    assert!(response.events.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_admin_cursor_resumes_after_seen_event() {
    let (_store, service) = synchronous_service(QueueConfig::default()).await;

    for order in ["O1", "O2", "O3"] {
        service.publish_new_order(order, "Ada", "10.00").await.unwrap();
    }

    let first = service
        .poll_events(PollRequest::new(SubjectKey::Admin), &CancellationToken::new())
        .await
        .unwrap();
    let ids: Vec<_> = first.events.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, ["O1", "O2", "O3"]);

    let cursor = first.events[1].id.to_string();
    let resumed = service
        .poll_events(
            PollRequest::new(SubjectKey::Admin).with_last_event_id(Some(cursor)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(resumed.events.len(), 1);
    assert_eq!(resumed.events[0].entity_id, "O3");
    assert_eq!(resumed.last_event_id, first.events[2].id.to_string());
}

#[test_log::test(tokio::test)]
async fn test_events_are_ordered_by_timestamp() {
    let (_store, service) = synchronous_service(QueueConfig::default()).await;

    for i in 0..20 {
        service
            .publish_order_update(&format!("O{i}"), "STATUS", None)
            .await
            .unwrap();
    }

    let response = service
        .poll_events(PollRequest::new(SubjectKey::Admin), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.events.len(), 20);
    assert!(response
        .events
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp));
}

#[test_log::test(tokio::test)]
async fn test_queue_stays_bounded() {
    let config = QueueConfig::default().with_max_page_size(10);
    let (store, service) = synchronous_service(config).await;
    let key = SubjectKey::user("U1").storage_key();

    for i in 0..55 {
        service
            .publish_order_status_change(&format!("O{i}"), "U1", "PAID")
            .await
            .unwrap();
        assert!(store.len(&key).await.unwrap() <= 20);
    }

    // A full page signals more to come
    let response = service
        .poll_events(PollRequest::new(SubjectKey::user("U1")), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.events.len(), 10);
    assert!(response.has_more);
}

#[test_log::test(tokio::test)]
async fn test_type_filtered_poll() {
    let (_store, service) = synchronous_service(QueueConfig::default()).await;

    service.publish_new_order("O1", "Ada", "1").await.unwrap();
    service
        .publish_order_update("O1", "ADDRESS_CHANGED", None)
        .await
        .unwrap();
    service.publish_new_order("O2", "Bob", "2").await.unwrap();

    let request = PollRequest::new(SubjectKey::Admin)
        .with_event_type(Some(EventType::AdminOrderUpdate));
    let response = service
        .poll_events(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.events.len(), 1);
    assert_eq!(response.events[0].event_type, EventType::AdminOrderUpdate);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_long_poll_wakes_after_publish() {
    let (_store, service) = synchronous_service(QueueConfig::default()).await;
    let start = tokio::time::Instant::now();

    let poller = {
        let service = service.clone();
        tokio::spawn(async move {
            let request = PollRequest::new(SubjectKey::user("U1")).with_long_poll(true);
            service.poll_events(request, &CancellationToken::new()).await
        })
    };

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    service
        .publish_order_status_change("O1", "U1", "DELIVERED")
        .await
        .unwrap();

    let response = poller.await.unwrap().unwrap();
    assert_eq!(response.events.len(), 1);
    assert_eq!(response.poll_interval, 30_000);

    // Woken on the first tick after the write
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2_500));
    assert!(elapsed <= Duration::from_millis(3_500));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_long_poll_cancelled_by_client() {
    let (_store, service) = service_with(QueueConfig::default());
    let cancel = CancellationToken::new();

    let poller = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let request = PollRequest::new(SubjectKey::Admin).with_long_poll(true);
            service.poll_events(request, &cancel).await
        })
    };

    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();

    let err = poller.await.unwrap().unwrap_err();
    assert!(matches!(err, QueueError::Cancelled));
}
