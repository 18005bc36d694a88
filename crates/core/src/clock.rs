//! Monotonic timestamp source
//!
//! Scores are microseconds since the epoch. Two publishes in the same
//! microsecond would otherwise collide, and a reader whose upper bound is the
//! wall clock could miss an event stamped a hair later on another thread. The
//! clock hands out strictly increasing values and lets readers peek at the
//! highest value issued so far.
//!
//! A timestamp handed to a publisher through [`MonotonicClock::reserve`] stays
//! pending until its [`Reservation`] is dropped. The read horizon stops just
//! below the oldest pending timestamp, so a cursor can never move past an
//! event whose write has not landed yet.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::event::Score;

/// Process-wide source of strictly increasing event timestamps
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
    pending: Mutex<BTreeSet<Score>>,
}

/// A timestamp whose write is still in flight
///
/// Dropping the reservation releases the timestamp, whether the write
/// succeeded, failed or was abandoned.
#[derive(Debug)]
pub struct Reservation {
    clock: Arc<MonotonicClock>,
    score: Score,
}

impl Reservation {
    pub fn timestamp(&self) -> DateTime<Utc> {
        from_micros(self.score)
    }

    pub fn score(&self) -> Score {
        self.score
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.clock.pending.lock().remove(&self.score);
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next timestamp: `max(wall_now, last + 1)`
    pub fn next(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let candidate = wall.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return from_micros(candidate),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Issue the next timestamp and hold it pending until the reservation drops
    pub fn reserve(self: &Arc<Self>) -> Reservation {
        let mut pending = self.pending.lock();
        let score = self.next().timestamp_micros();
        pending.insert(score);
        Reservation {
            clock: Arc::clone(self),
            score,
        }
    }

    /// Number of reserved timestamps not yet released
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Highest score a reader may include
    ///
    /// Just below the oldest pending reservation when writes are in flight,
    /// [`now_score`](Self::now_score) otherwise.
    pub fn read_horizon(&self) -> Score {
        let pending = self.pending.lock();
        match pending.first() {
            Some(oldest) => oldest.saturating_sub(1),
            None => self.now_score(),
        }
    }

    /// Current read horizon: never behind any timestamp already issued
    pub fn now(&self) -> DateTime<Utc> {
        from_micros(self.now_score())
    }

    /// Current read horizon as a score
    pub fn now_score(&self) -> Score {
        Utc::now()
            .timestamp_micros()
            .max(self.last.load(Ordering::Acquire))
    }
}

fn from_micros(micros: Score) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_strictly_increasing() {
        let clock = MonotonicClock::new();
        let mut prev = clock.next();
        for _ in 0..1_000 {
            let next = clock.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_now_never_behind_issued() {
        let clock = MonotonicClock::new();
        let mut issued = Vec::new();
        for _ in 0..100 {
            issued.push(clock.next());
        }
        let horizon = clock.now();
        assert!(issued.iter().all(|ts| *ts <= horizon));
    }

    #[test]
    fn test_horizon_stops_below_pending_reservation() {
        let clock = Arc::new(MonotonicClock::new());
        let first = clock.reserve();
        let second = clock.reserve();
        assert!(second.score() > first.score());
        assert_eq!(clock.read_horizon(), first.score() - 1);

        drop(first);
        assert_eq!(clock.read_horizon(), second.score() - 1);

        let last = second.score();
        drop(second);
        assert_eq!(clock.pending(), 0);
        assert!(clock.read_horizon() >= last);
    }

    #[test]
    fn test_unique_across_threads() {
        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| clock.next().timestamp_micros())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1_000);
    }
}
