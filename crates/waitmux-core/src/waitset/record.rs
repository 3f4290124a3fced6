//! Per-trigger storage.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::cell::UnsafeCell;
use std::sync::Arc;

use super::types::TriggerIndex;

/// A registered wake-up condition.
pub(crate) type ConditionFn = dyn Fn() -> bool + Send + Sync;
/// A side effect to run when the trigger is drained.
pub(crate) type CallbackFn = dyn Fn() + Send + Sync;

/// One registered trigger.
///
/// Shared between the set's slot table and every token clone; the `Arc`
/// strong count is the record's reference count, and the record is
/// released when the last holder drops it. The condition is immutable for
/// the record's whole lifetime, which is what lets the notify path read it
/// without any lock.
pub(crate) struct TriggerRecord {
    pub(crate) index: TriggerIndex,
    pub(crate) id: u64,
    pub(crate) condition: Box<ConditionFn>,
    /// Read and written only under the owning set's container mutex;
    /// drained clones are invoked after that mutex is released.
    callback: UnsafeCell<Option<Arc<CallbackFn>>>,
    /// How many times the trigger fired since the last drain.
    pub(crate) pending: AtomicU64,
    /// Set once the slot is removed from the set; lingering token clones
    /// observe it and turn into no-ops.
    detached: AtomicBool,
}

// SAFETY: `callback` is only accessed under the container mutex; every
// other field is atomic or immutable after construction.
unsafe impl Send for TriggerRecord {}
// SAFETY: as above.
unsafe impl Sync for TriggerRecord {}

impl TriggerRecord {
    pub(crate) fn new(
        index: TriggerIndex,
        id: u64,
        condition: Box<ConditionFn>,
        callback: Option<Arc<CallbackFn>>,
    ) -> Self {
        Self {
            index,
            id,
            condition,
            callback: UnsafeCell::new(callback),
            pending: AtomicU64::new(0),
            detached: AtomicBool::new(false),
        }
    }

    /// Evaluate the condition. Lock-free by design: the notify path must
    /// never contend with the set's critical section.
    pub(crate) fn evaluate(&self) -> bool {
        (self.condition)()
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Replace the callback.
    ///
    /// # Safety
    ///
    /// The caller must hold the owning set's container mutex.
    pub(crate) unsafe fn set_callback_locked(&self, callback: Option<Arc<CallbackFn>>) {
        // SAFETY: exclusive access guaranteed by the container mutex.
        unsafe {
            *self.callback.get() = callback;
        }
    }

    /// Clone the current callback handle for invocation outside the mutex.
    ///
    /// # Safety
    ///
    /// The caller must hold the owning set's container mutex.
    pub(crate) unsafe fn callback_locked(&self) -> Option<Arc<CallbackFn>> {
        // SAFETY: shared access guaranteed by the container mutex.
        unsafe { (*self.callback.get()).clone() }
    }
}
