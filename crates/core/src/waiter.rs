//! Long-poll waiting
//!
//! A long poll re-runs a fetch on a fixed cadence until it returns events,
//! the deadline passes or the caller cancels. The tick loop runs on its own
//! task and hands its result back over a oneshot channel; the caller races
//! that handoff against its cancellation token.
//!
//! ```text
//!   caller ──select!──┬── cancel.cancelled() ──> Err(Cancelled)
//!                     └── oneshot rx <── tick task: tick → deadline? → fetch
//! ```
//!
//! The tick task is aborted whenever the caller stops waiting, so it never
//! outlives the call.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::resolver::PollBatch;

/// How a long poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The fetch produced a non-empty batch
    Ready(PollBatch),
    /// The deadline passed with nothing new
    TimedOut,
}

/// Fixed-cadence long-poll driver
#[derive(Debug, Clone, Copy)]
pub struct LongPollWaiter {
    timeout: Duration,
    tick: Duration,
}

impl LongPollWaiter {
    pub fn new(timeout: Duration, tick: Duration) -> Self {
        Self { timeout, tick }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.long_poll_timeout, config.tick_interval)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fetch` every tick until it returns events or the deadline passes
    ///
    /// The first fetch happens immediately. A fetch error ends the wait and
    /// is returned as is. Cancellation wins over a pending tick but never over
    /// a result already handed back.
    pub async fn wait<F, Fut>(
        &self,
        fetch: F,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome, QueueError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<PollBatch, QueueError>> + Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        let (tx, rx) = oneshot::channel();

        let tick = self.tick;
        let _ticker = AbortOnDropHandle::new(tokio::spawn(async move {
            let outcome = tick_until(fetch, deadline, tick).await;
            let _ = tx.send(outcome);
        }));

        tokio::select! {
            biased;
            handoff = rx => handoff.unwrap_or_else(|_| {
                Err(QueueError::Internal("long-poll task ended without a result".into()))
            }),
            _ = cancel.cancelled() => {
                debug!("Long poll cancelled by caller");
                Err(QueueError::Cancelled)
            }
        }
    }
}

async fn tick_until<F, Fut>(
    mut fetch: F,
    deadline: Instant,
    tick: Duration,
) -> Result<WaitOutcome, QueueError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollBatch, QueueError>>,
{
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if Instant::now() >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }

        let batch = fetch().await?;
        if !batch.is_empty() {
            return Ok(WaitOutcome::Ready(batch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventAction, EventType, Metadata};
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn batch_of_one() -> PollBatch {
        let event = Event {
            id: uuid::Uuid::now_v7(),
            event_type: EventType::AdminNewOrder,
            action: EventAction::FetchNew,
            entity_id: "O1".into(),
            entity_type: "ORDER".into(),
            metadata: Metadata::new(),
            timestamp: chrono::Utc::now(),
            ttl: 300,
        };
        PollBatch {
            next_cursor: Some(event.id.to_string()),
            events: vec![event],
            has_more: false,
        }
    }

    /// Fetch that returns a batch on the given attempt (1-based) and counts calls
    fn fetch_ready_on(
        attempt: usize,
    ) -> (
        Arc<AtomicUsize>,
        impl FnMut() -> std::future::Ready<Result<PollBatch, QueueError>> + Send + 'static,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(if n >= attempt {
                batch_of_one()
            } else {
                PollBatch::empty(None)
            }))
        };
        (calls, fetch)
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_result() {
        let waiter = LongPollWaiter::new(Duration::from_secs(25), Duration::from_secs(1));
        let (calls, fetch) = fetch_ready_on(1);

        let start = Instant::now();
        let outcome = waiter.wait(fetch, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Ready(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wakes_on_later_tick() {
        let waiter = LongPollWaiter::new(Duration::from_secs(25), Duration::from_secs(1));
        let (calls, fetch) = fetch_ready_on(4);

        let start = Instant::now();
        let outcome = waiter.wait(fetch, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Ready(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_one_tick_of_deadline() {
        let timeout = Duration::from_millis(2_500);
        let tick = Duration::from_secs(1);
        let waiter = LongPollWaiter::new(timeout, tick);
        let (_calls, fetch) = fetch_ready_on(usize::MAX);

        let start = Instant::now();
        let outcome = waiter.wait(fetch, &CancellationToken::new()).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_propagates() {
        let waiter = LongPollWaiter::new(Duration::from_secs(25), Duration::from_secs(1));
        let fetch = || async {
            Err::<PollBatch, _>(QueueError::Store(StoreError::Unavailable("down".into())))
        };

        let err = waiter.wait(fetch, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, QueueError::Store(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_ticking() {
        let waiter = LongPollWaiter::new(Duration::from_secs(25), Duration::from_secs(1));
        let (calls, fetch) = fetch_ready_on(usize::MAX);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            trigger.cancel();
        });

        let err = waiter.wait(fetch, &cancel).await.unwrap_err();
        assert!(matches!(err, QueueError::Cancelled));

        let seen = calls.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        // The tick task was torn down with the call
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_stops_ticking() {
        let waiter = LongPollWaiter::new(Duration::from_secs(25), Duration::from_secs(1));
        let (calls, fetch) = fetch_ready_on(usize::MAX);

        let call = tokio::time::timeout(
            Duration::from_millis(1_500),
            waiter.wait(fetch, &CancellationToken::new()),
        )
        .await;
        assert!(call.is_err());

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}
