//! Counting semaphores.
//!
//! [`Semaphore`] is the bounded kernel-backed primitive every blocking
//! operation in this crate funnels through; the futex word is the count
//! itself. [`LightweightSemaphore`] puts an adaptive user-space spinner in
//! front of it for workloads where tokens arrive faster than a park/unpark
//! round trip.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::futex;

/// Bounded counting semaphore.
///
/// Invariants: `0 <= value <= max`, and `wait_count` is a conservative
/// upper bound on the number of threads parked in [`wait`](Self::wait):
/// it may briefly exceed the true count but is never lower. The bound on
/// `value` means [`post`](Self::post) saturates rather than wrapping; the
/// returned amount tells the caller how much was actually credited.
pub struct Semaphore {
    value: AtomicU32,
    wait_count: AtomicU32,
    max_value: u32,
}

impl Semaphore {
    /// Semaphore with `initial` tokens and the largest representable bound.
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self::with_max(initial, u32::MAX)
    }

    /// Semaphore with `initial` tokens, saturating at `max_value`.
    /// A zero bound is raised to one; `initial` is clamped to the bound.
    #[must_use]
    pub fn with_max(initial: u32, max_value: u32) -> Self {
        let max_value = max_value.max(1);
        Self {
            value: AtomicU32::new(initial.min(max_value)),
            wait_count: AtomicU32::new(0),
            max_value,
        }
    }

    /// Racy snapshot of the current count.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Take one token without blocking. Returns `false` if none is
    /// available.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        let mut value = self.value.load(Ordering::Relaxed);
        loop {
            if value == 0 {
                return false;
            }
            match self.value.compare_exchange_weak(
                value,
                value - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => value = observed,
            }
        }
    }

    /// Take one token, parking until one is posted.
    ///
    /// The waiter count is raised before the first park so that a
    /// concurrent [`post`](Self::post) cannot skip its wake: post orders
    /// "increment value, then probe `wait_count`" against our "raise
    /// `wait_count`, then have the park compare `value` against zero";
    /// one of the two sides always observes the other.
    pub fn wait(&self) {
        if self.try_wait() {
            return;
        }
        self.wait_count.fetch_add(1, Ordering::AcqRel);
        loop {
            futex::wait(&self.value, 0);
            if self.try_wait() {
                break;
            }
        }
        self.wait_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Credit up to `n` tokens, saturating at the bound.
    ///
    /// Returns the amount actually credited; a return smaller than `n`
    /// signals saturation. Wakes as many parked threads as tokens were
    /// credited, and only when the waiter probe says someone may be
    /// parked; the common uncontended post never enters the kernel.
    pub fn post(&self, n: u32) -> u32 {
        let mut value = self.value.load(Ordering::Relaxed);
        let added;
        loop {
            let room = self.max_value - value;
            if room == 0 {
                return 0;
            }
            let grant = n.min(room);
            match self.value.compare_exchange_weak(
                value,
                value + grant,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    added = grant;
                    break;
                }
                Err(observed) => value = observed,
            }
        }
        if added > 0 && self.wait_count.load(Ordering::Acquire) != 0 {
            futex::wake(&self.value, added);
        }
        added
    }
}

/// Spin budget ceiling for [`LightweightSemaphore`].
pub const DEFAULT_MAX_SPIN: u32 = 100_000;

/// Semaphore with an adaptive spin prelude.
///
/// The signed count goes negative while threads are committed to the slow
/// path; the inner [`Semaphore`] only ever holds wake-up credits. The spin
/// budget doubles after an acquisition that succeeded while spinning and
/// halves after one that had to park, so sustained contention converges on
/// parking promptly instead of burning cycles.
pub struct LightweightSemaphore {
    count: AtomicI32,
    spin: AtomicU32,
    max_spin: u32,
    semaphore: Semaphore,
}

impl LightweightSemaphore {
    /// Lightweight semaphore with `initial` tokens and the default spin
    /// ceiling.
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self::with_spin(initial, DEFAULT_MAX_SPIN)
    }

    /// Lightweight semaphore with an explicit spin ceiling (floored at 1).
    #[must_use]
    pub fn with_spin(initial: u32, max_spin: u32) -> Self {
        let max_spin = max_spin.max(1);
        Self {
            count: AtomicI32::new(initial.min(i32::MAX as u32) as i32),
            spin: AtomicU32::new(max_spin),
            max_spin,
            semaphore: Semaphore::new(0),
        }
    }

    /// Take one token without blocking.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        let count = self.count.load(Ordering::Relaxed);
        count > 0
            && self
                .count
                .compare_exchange(count, count - 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    /// Take one token, spinning then parking.
    pub fn wait(&self) {
        if !self.try_wait() {
            self.wait_with_adaptive_spinning();
        }
    }

    /// Credit `n` tokens, waking exactly the number of committed waiters
    /// the credit covers.
    pub fn post(&self, n: u32) {
        let n = n.min(i32::MAX as u32) as i32;
        let old_count = self.count.fetch_add(n, Ordering::Release);
        let to_release = (-old_count).min(n);
        if to_release > 0 {
            self.semaphore.post(to_release as u32);
        }
    }

    fn wait_with_adaptive_spinning(&self) {
        let mut budget = self.spin.load(Ordering::Relaxed);
        while budget > 0 {
            budget -= 1;
            let count = self.count.load(Ordering::Relaxed);
            if count > 0
                && self
                    .count
                    .compare_exchange(count, count - 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                self.increase_spin();
                return;
            }
            core::hint::spin_loop();
        }
        // Commit to the slow path: a negative count is a debt the next
        // posts will cover with semaphore credits.
        let old_count = self.count.fetch_sub(1, Ordering::Acquire);
        if old_count <= 0 {
            self.decrease_spin();
            self.semaphore.wait();
        }
    }

    fn increase_spin(&self) {
        let spin = self.spin.load(Ordering::Relaxed);
        self.spin
            .store((spin.saturating_mul(2)).min(self.max_spin), Ordering::Relaxed);
    }

    fn decrease_spin(&self) {
        let spin = self.spin.load(Ordering::Relaxed);
        self.spin.store((spin / 2).max(1), Ordering::Relaxed);
    }
}
