//! Bounded write slots for asynchronous publishing
//!
//! A fixed number of slots caps concurrent background writes. Acquisition
//! never waits: when every slot is taken the publisher writes synchronously
//! on the caller's task instead, which throttles publishers under load.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed pool of write slots
#[derive(Debug, Clone)]
pub struct WriteSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot; released on drop
#[derive(Debug)]
pub struct WriteSlot {
    _permit: OwnedSemaphorePermit,
}

impl WriteSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot if one is free right now. Returns `None` when the pool is
    /// exhausted or closed.
    pub fn try_acquire(&self) -> Option<WriteSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| WriteSlot { _permit: permit })
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Stop handing out slots. Held slots stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let slots = WriteSlots::new(2);
        let a = slots.try_acquire();
        let b = slots.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(slots.try_acquire().is_none());
        assert_eq!(slots.in_flight(), 2);

        drop(a);
        assert_eq!(slots.available(), 1);
        assert!(slots.try_acquire().is_some());
    }

    #[test]
    fn test_closed_pool_refuses_slots() {
        let slots = WriteSlots::new(4);
        let held = slots.try_acquire();
        slots.close();

        assert!(slots.is_closed());
        assert!(slots.try_acquire().is_none());
        assert_eq!(slots.in_flight(), 1);

        drop(held);
        assert_eq!(slots.in_flight(), 0);
    }
}
