//! Condition variables over per-waiter semaphores.
//!
//! Each waiter parks on its own [`Semaphore`]; the wait list holding the
//! nodes is the only shared structure and sits behind an internal
//! [`Mutex`] held strictly across pointer edits, never across the park.
//! The caller's external lock is released before parking and reacquired
//! after waking, so a predicate that only changes under that lock stays
//! true for the caller once observed true.

mod timed;

pub use timed::TimedCondvar;

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::mutex::{Lockable, Mutex};
use crate::semaphore::Semaphore;

struct WaitNode {
    semaphore: Semaphore,
}

impl WaitNode {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            semaphore: Semaphore::new(0),
        })
    }
}

/// Predicate-based wait with an external lock.
///
/// Waiters are notified newest-first (the list is a stack, as wake-up
/// order is unspecified anyway). Spurious wake-ups are absorbed by the
/// predicate loop in [`wait_while`](Self::wait_while).
pub struct Condvar {
    wait_list_lock: Mutex,
    wait_list: UnsafeCell<Vec<Arc<WaitNode>>>,
}

// SAFETY: `wait_list` is only touched while `wait_list_lock` is held.
unsafe impl Send for Condvar {}
// SAFETY: as above.
unsafe impl Sync for Condvar {}

impl Condvar {
    #[must_use]
    pub fn new() -> Self {
        Self {
            wait_list_lock: Mutex::new(),
            wait_list: UnsafeCell::new(Vec::new()),
        }
    }

    /// Park until notified.
    ///
    /// `lock` must be held on entry; it is released while parked and held
    /// again when the call returns. Without a predicate the caller is
    /// responsible for re-checking whatever it is waiting for.
    pub fn wait<L: Lockable>(&self, lock: &L) {
        let node = WaitNode::new();
        {
            let _list = self.wait_list_lock.guard();
            // SAFETY: list lock held.
            unsafe {
                (*self.wait_list.get()).push(Arc::clone(&node));
            }
        }
        // A notification between here and the park is not lost: it has
        // already credited the node's semaphore.
        lock.unlock();
        node.semaphore.wait();
        lock.lock();
    }

    /// Park until `predicate` is true, then return with `lock` held.
    ///
    /// The predicate must only change while `lock` is held.
    pub fn wait_while<L: Lockable>(&self, lock: &L, mut predicate: impl FnMut() -> bool) {
        if predicate() {
            return;
        }
        let node = WaitNode::new();
        {
            let _list = self.wait_list_lock.guard();
            // SAFETY: list lock held.
            unsafe {
                (*self.wait_list.get()).push(Arc::clone(&node));
            }
        }
        loop {
            lock.unlock();
            node.semaphore.wait();
            lock.lock();

            // A woken node is off the list and cannot be notified again,
            // which is exactly why the predicate re-check and the
            // re-insertion happen under the list lock: no notification can
            // slip between the decision to sleep again and being
            // reachable again.
            let _list = self.wait_list_lock.guard();
            if predicate() {
                return;
            }
            // SAFETY: list lock held.
            unsafe {
                (*self.wait_list.get()).push(Arc::clone(&node));
            }
        }
    }

    /// Wake one waiter, if any.
    pub fn notify_one(&self) {
        let _list = self.wait_list_lock.guard();
        // SAFETY: list lock held.
        let node = unsafe { (*self.wait_list.get()).pop() };
        if let Some(node) = node {
            node.semaphore.post(1);
        }
    }

    /// Wake every current waiter.
    pub fn notify_all(&self) {
        let _list = self.wait_list_lock.guard();
        // SAFETY: list lock held.
        let drained = unsafe { std::mem::take(&mut *self.wait_list.get()) };
        for node in drained {
            node.semaphore.post(1);
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
