//! Trigger handles.

use core::sync::atomic::Ordering;
use std::sync::Arc;

use super::record::{CallbackFn, TriggerRecord};
use super::types::{INVALID_ID, INVALID_INDEX, TriggerIndex};
use super::WaitSetInner;

/// Handle to a trigger registered with a [`WaitSet`](super::WaitSet).
///
/// Tokens are cheap to clone; every live clone keeps the underlying record
/// alive. Removing the trigger from the set does not invalidate clones
/// eagerly; they observe the record's detached flag and become no-ops.
/// The token holds the set's inner state alive too, so even a token that
/// outlives its `WaitSet` degrades to a no-op instead of dangling.
#[derive(Clone)]
pub struct WaitToken {
    set: Arc<WaitSetInner>,
    record: Option<Arc<TriggerRecord>>,
}

impl WaitToken {
    pub(crate) fn bind(set: Arc<WaitSetInner>, record: Arc<TriggerRecord>) -> Self {
        Self {
            set,
            record: Some(record),
        }
    }

    pub(crate) fn record(&self) -> Option<&Arc<TriggerRecord>> {
        self.record.as_ref()
    }

    /// The trigger's slot index, or [`INVALID_INDEX`] after invalidation.
    #[must_use]
    pub fn index(&self) -> TriggerIndex {
        self.record.as_ref().map_or(INVALID_INDEX, |r| r.index)
    }

    /// The trigger's process-unique id, or [`INVALID_ID`] after
    /// invalidation.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.record.as_ref().map_or(INVALID_ID, |r| r.id)
    }

    /// True while the token is bound to a trigger that is still attached
    /// to a live set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.set.is_alive()
            && self
                .record
                .as_ref()
                .is_some_and(|r| !r.is_detached())
    }

    /// Evaluate the trigger's condition. Detached or invalidated tokens
    /// report `false`.
    #[must_use]
    pub fn evaluate(&self) -> bool {
        match &self.record {
            Some(record) if !record.is_detached() && self.set.is_alive() => record.evaluate(),
            _ => false,
        }
    }

    /// Replace the trigger's drain callback.
    pub fn set_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.store_callback(Some(Arc::new(callback)));
    }

    /// Remove the trigger's drain callback.
    pub fn clear_callback(&self) {
        self.store_callback(None);
    }

    fn store_callback(&self, callback: Option<Arc<CallbackFn>>) {
        let Some(record) = &self.record else { return };
        if record.is_detached() || !self.set.is_alive() {
            return;
        }
        let _table = self.set.table_lock.guard();
        // SAFETY: container mutex held.
        unsafe {
            record.set_callback_locked(callback);
        }
    }

    /// Report the trigger.
    ///
    /// The condition is re-evaluated first; a report whose condition is
    /// false is dropped. Otherwise the trigger's pending count rises and
    /// the set's wake-up channel is signaled. This path takes no locks:
    /// notifiers never contend with the set's critical section.
    pub fn notify(&self) {
        let Some(record) = &self.record else { return };
        if record.is_detached() || !self.set.is_alive() {
            return;
        }
        if !record.evaluate() {
            return;
        }
        record.pending.fetch_add(1, Ordering::Release);
        self.set.event.signal();
    }

    /// Drop this token's binding. Other clones are unaffected; the record
    /// itself is released when the last clone lets go.
    pub fn invalidate(&mut self) {
        self.record = None;
    }
}
