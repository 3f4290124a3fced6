//! Auto-reset event: a one-shot signal that coalesces.
//!
//! The signed counter is always at most 1:
//!
//! - `1`  signaled, nobody waiting;
//! - `0`  quiet, nobody waiting;
//! - `-k` means `k` threads are (or are about to be) parked on the embedded
//!   semaphore.
//!
//! Signaling saturates at 1, so redundant signals are idempotent; unlike
//! a counting semaphore, the event does not build up credit. A signal that
//! observes a negative count releases exactly one waiter.

use core::sync::atomic::{AtomicI64, Ordering};

use crate::semaphore::Semaphore;

/// One-shot coalescing signal.
pub struct AutoResetEvent {
    count: AtomicI64,
    semaphore: Semaphore,
}

impl AutoResetEvent {
    /// Event starting quiet, or already holding one pre-signal.
    #[must_use]
    pub fn new(initially_signaled: bool) -> Self {
        Self {
            count: AtomicI64::new(i64::from(initially_signaled)),
            semaphore: Semaphore::new(0),
        }
    }

    /// Signal the event.
    ///
    /// Saturates at 1; if the pre-state was negative a waiter is owed a
    /// wake-up and the embedded semaphore is posted once. Memory is
    /// synchronized on the release even when the count is already 1.
    pub fn signal(&self) {
        let mut count = self.count.load(Ordering::Relaxed);
        loop {
            let new_count = if count < 1 { count + 1 } else { 1 };
            match self.count.compare_exchange_weak(
                count,
                new_count,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => count = observed,
            }
        }
        if count < 0 {
            self.semaphore.post(1);
        }
    }

    /// Wait for a signal, consuming it.
    ///
    /// If a pre-signal was pending (`count == 1`) the wait returns without
    /// blocking; a subsequent signaler sees `0` and does a cheap increment.
    /// Otherwise the decrement announces this thread as a waiter and the
    /// semaphore absorbs the park.
    pub fn wait(&self) {
        let count = self.count.fetch_sub(1, Ordering::AcqRel);
        if count < 1 {
            self.semaphore.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pre_signal_is_consumed_without_blocking() {
        let event = AutoResetEvent::new(true);
        event.wait();
        assert_eq!(event.count.load(Ordering::Acquire), 0);
    }

    #[test]
    fn redundant_signals_coalesce() {
        let event = AutoResetEvent::new(false);
        event.signal();
        event.signal();
        event.signal();
        // Only a single pre-signal was retained.
        assert_eq!(event.count.load(Ordering::Acquire), 1);
        event.wait();
        assert_eq!(event.count.load(Ordering::Acquire), 0);
    }

    #[test]
    fn signal_releases_parked_waiter() {
        let event = Arc::new(AutoResetEvent::new(false));
        let waiter_event = Arc::clone(&event);
        let waiter = thread::spawn(move || waiter_event.wait());
        thread::sleep(Duration::from_millis(50));
        event.signal();
        waiter.join().unwrap();
        assert_eq!(event.count.load(Ordering::Acquire), 0);
    }

    #[test]
    fn one_signal_releases_exactly_one_of_many() {
        use core::sync::atomic::AtomicU32;

        let event = Arc::new(AutoResetEvent::new(false));
        let released = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                let released = Arc::clone(&released);
                thread::spawn(move || {
                    event.wait();
                    released.fetch_add(1, Ordering::AcqRel);
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(50));
        event.signal();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(released.load(Ordering::Acquire), 1);
        // Release the rest so the test can join.
        event.signal();
        event.signal();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(released.load(Ordering::Acquire), 3);
    }
}
