//! Timed predicate wait.
//!
//! Each wait node owns a one-shot [`Timer`] and a claim word. The notify
//! path and the timer path both funnel through the wait-list lock; the
//! claim decides which of them posts the node's semaphore, and the loser
//! does nothing. A timed-out claim is sticky, so a deadline that elapses
//! while the waiter is awake re-checking its predicate still turns into a
//! timeout instead of another park.

use core::sync::atomic::{AtomicU32, Ordering};
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::time::Duration;

use crate::mutex::{Lockable, Mutex};
use crate::semaphore::Semaphore;
use crate::timer::Timer;

const CLAIM_FREE: u32 = 0;
const CLAIM_NOTIFIED: u32 = 1;
const CLAIM_TIMED_OUT: u32 = 2;

struct TimedWaitNode {
    semaphore: Semaphore,
    claim: AtomicU32,
}

impl TimedWaitNode {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            semaphore: Semaphore::new(0),
            claim: AtomicU32::new(CLAIM_FREE),
        })
    }
}

/// Shared wait list. Lives behind an `Arc` so the timer callback captures
/// an owning handle rather than a back-pointer into the condvar.
struct TimedInner {
    wait_list_lock: Mutex,
    wait_list: UnsafeCell<Vec<Arc<TimedWaitNode>>>,
}

// SAFETY: `wait_list` is only touched while `wait_list_lock` is held.
unsafe impl Send for TimedInner {}
// SAFETY: as above.
unsafe impl Sync for TimedInner {}

impl TimedInner {
    /// Put `node` (back) on the list, eligible for notification.
    /// Invariant: a node is on the list exactly while its claim is free.
    fn insert(&self, node: &Arc<TimedWaitNode>) {
        let _list = self.wait_list_lock.guard();
        node.claim.store(CLAIM_FREE, Ordering::Release);
        // SAFETY: list lock held.
        unsafe {
            (*self.wait_list.get()).push(Arc::clone(node));
        }
    }

    /// Timer path: claim the node as timed out and release its waiter.
    fn expire(&self, node: &Arc<TimedWaitNode>) {
        let _list = self.wait_list_lock.guard();
        if node
            .claim
            .compare_exchange(
                CLAIM_FREE,
                CLAIM_TIMED_OUT,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            // Free claim means the node is on the list; take it off so a
            // later notify cannot double-post it.
            // SAFETY: list lock held.
            let list = unsafe { &mut *self.wait_list.get() };
            if let Some(pos) = list.iter().position(|n| Arc::ptr_eq(n, node)) {
                list.remove(pos);
            }
            node.semaphore.post(1);
        } else {
            // A notifier won the post. The waiter is awake or about to be;
            // the sticky timed-out mark keeps it from parking again.
            node.claim.store(CLAIM_TIMED_OUT, Ordering::Release);
        }
    }
}

/// Condition variable whose predicate waits carry a deadline.
pub struct TimedCondvar {
    inner: Arc<TimedInner>,
}

impl TimedCondvar {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimedInner {
                wait_list_lock: Mutex::new(),
                wait_list: UnsafeCell::new(Vec::new()),
            }),
        }
    }

    /// Park until `predicate` is true or `timeout` elapses.
    ///
    /// Returns `true` if the predicate held on return, `false` on a
    /// timeout with the predicate still false. Either way `lock` is held
    /// when the call returns, and the predicate must only change while
    /// `lock` is held. The deadline covers the whole call, including
    /// re-parks after wake-ups that found the predicate false.
    pub fn wait_timeout<L: Lockable>(
        &self,
        lock: &L,
        mut predicate: impl FnMut() -> bool,
        timeout: Duration,
    ) -> bool {
        if predicate() {
            return true;
        }
        let node = TimedWaitNode::new();
        // On the list before the timer is armed, so an immediate expiry
        // still finds the node where the claim invariant expects it.
        self.inner.insert(&node);
        let timer_inner = Arc::clone(&self.inner);
        let timer_node = Arc::clone(&node);
        let _timer = Timer::one_shot(timeout, move || timer_inner.expire(&timer_node));

        loop {
            lock.unlock();
            node.semaphore.wait();
            lock.lock();

            if predicate() {
                return true;
            }
            if node.claim.load(Ordering::Acquire) == CLAIM_TIMED_OUT {
                return false;
            }
            // Notified, but the predicate is still false: re-park, unless
            // the deadline elapsed while we were awake. The re-check and
            // the re-insertion are a single step under the list lock.
            let _list = self.inner.wait_list_lock.guard();
            if node.claim.load(Ordering::Acquire) == CLAIM_TIMED_OUT {
                return false;
            }
            node.claim.store(CLAIM_FREE, Ordering::Release);
            // SAFETY: list lock held.
            unsafe {
                (*self.inner.wait_list.get()).push(Arc::clone(&node));
            }
        }
    }

    /// Wake one waiter, if any.
    pub fn notify_one(&self) {
        let _list = self.inner.wait_list_lock.guard();
        // SAFETY: list lock held.
        let node = unsafe { (*self.inner.wait_list.get()).pop() };
        if let Some(node) = node {
            node.claim.store(CLAIM_NOTIFIED, Ordering::Release);
            node.semaphore.post(1);
        }
    }

    /// Wake every current waiter.
    pub fn notify_all(&self) {
        let _list = self.inner.wait_list_lock.guard();
        // SAFETY: list lock held.
        let drained = unsafe { std::mem::take(&mut *self.inner.wait_list.get()) };
        for node in drained {
            node.claim.store(CLAIM_NOTIFIED, Ordering::Release);
            node.semaphore.post(1);
        }
    }
}

impl Default for TimedCondvar {
    fn default() -> Self {
        Self::new()
    }
}
