//! Fan-in multiplexer: many triggers, one waiter.
//!
//! A wait-set owns a fixed-capacity table of trigger records and a single
//! [`AutoResetEvent`] as the wake-up channel. Producers report triggers
//! through [`WaitToken::notify`]; the one consumer thread sits in
//! [`WaitSet::wait`] and receives, per wake-up, the batch of indices whose
//! triggers fired since the last drain.
//!
//! Lock discipline: the container mutex protects the slot table and the
//! active-index list. It is held across drain scans, `add`, `remove`, and
//! callback replacement, but never across the blocking wait on the event and
//! never while user callbacks or filters run. Notify paths touch only
//! atomics plus the event's internal semaphore.
//!
//! Threading model: single-consumer, multi-producer. The latch-and-drain
//! protocol needs an exclusive drainer; a second concurrent `wait` is a
//! contract violation and panics.

mod record;
mod token;
mod types;

pub use token::WaitToken;
pub use types::{INVALID_ID, INVALID_INDEX, TriggerIndex, WakeUpSet};

use core::sync::atomic::{AtomicBool, Ordering};
use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::event::AutoResetEvent;
use crate::mutex::Mutex;
use record::{CallbackFn, ConditionFn, TriggerRecord};
use types::next_trigger_id;

/// Slot table plus iteration bookkeeping, all behind the container mutex.
struct SlotTable {
    slots: Vec<Option<Arc<TriggerRecord>>>,
    /// Attached indices in registration order; the drain scan order.
    active: Vec<TriggerIndex>,
    /// Recyclable indices, popped lowest-first.
    free: Vec<TriggerIndex>,
}

impl SlotTable {
    fn with_capacity(capacity: u32) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            active: Vec::new(),
            free: (0..capacity).rev().collect(),
        }
    }
}

pub(crate) struct WaitSetInner {
    pub(crate) event: AutoResetEvent,
    pub(crate) table_lock: Mutex,
    table: UnsafeCell<SlotTable>,
    /// Single-consumer enforcement for `wait`.
    draining: AtomicBool,
    /// Cleared when the owning `WaitSet` drops; token operations observe
    /// it and become no-ops.
    alive: AtomicBool,
}

// SAFETY: `table` is only touched while `table_lock` is held.
unsafe impl Send for WaitSetInner {}
// SAFETY: as above.
unsafe impl Sync for WaitSetInner {}

impl WaitSetInner {
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// The fired triggers of one drain, with their callbacks cloned out so
/// they can run after the container mutex is released.
type DrainBatch = Vec<(TriggerIndex, Option<Arc<CallbackFn>>)>;

/// Multiplexes up to `capacity` triggers onto a single waiter thread.
pub struct WaitSet {
    inner: Arc<WaitSetInner>,
}

impl WaitSet {
    /// Wait-set able to hold `capacity` triggers at once.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            inner: Arc::new(WaitSetInner {
                event: AutoResetEvent::new(false),
                table_lock: Mutex::new(),
                table: UnsafeCell::new(SlotTable::with_capacity(capacity)),
                draining: AtomicBool::new(false),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Register a trigger. Returns `None` when the set is full; the set is
    /// unchanged in that case.
    pub fn add(
        &self,
        condition: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Option<WaitToken> {
        self.attach(Box::new(condition), None)
    }

    /// Register a trigger with a callback that runs on every drain that
    /// reports it. Callbacks run on the waiter thread, outside the
    /// container mutex.
    pub fn add_with_callback(
        &self,
        condition: impl Fn() -> bool + Send + Sync + 'static,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Option<WaitToken> {
        self.attach(Box::new(condition), Some(Arc::new(callback)))
    }

    fn attach(
        &self,
        condition: Box<ConditionFn>,
        callback: Option<Arc<CallbackFn>>,
    ) -> Option<WaitToken> {
        let _table = self.inner.table_lock.guard();
        // SAFETY: container mutex held.
        let table = unsafe { &mut *self.inner.table.get() };
        let index = table.free.pop()?;
        let record = Arc::new(TriggerRecord::new(
            index,
            next_trigger_id(),
            condition,
            callback,
        ));
        table.slots[index as usize] = Some(Arc::clone(&record));
        table.active.push(index);
        Some(WaitToken::bind(Arc::clone(&self.inner), record))
    }

    /// Detach the trigger a token refers to. Returns `false` if the token
    /// no longer matches the slot (already removed, or the slot has been
    /// reused since).
    pub fn remove_token(&self, token: &WaitToken) -> bool {
        match token.record() {
            Some(record) => self.detach(record.index, Some(record.id)),
            None => false,
        }
    }

    /// Detach whatever trigger currently occupies `index`.
    pub fn remove_index(&self, index: TriggerIndex) -> bool {
        self.detach(index, None)
    }

    fn detach(&self, index: TriggerIndex, expect_id: Option<u64>) -> bool {
        let _table = self.inner.table_lock.guard();
        // SAFETY: container mutex held.
        let table = unsafe { &mut *self.inner.table.get() };
        let Some(slot) = table.slots.get_mut(index as usize) else {
            return false;
        };
        let Some(record) = slot else {
            return false;
        };
        // ABA guard: a token whose slot was recycled must not detach the
        // new occupant.
        if expect_id.is_some_and(|id| id != record.id) {
            return false;
        }
        record.detach();
        *slot = None;
        table.active.retain(|&active| active != index);
        table.free.push(index);
        true
    }

    /// Wake the waiter without reporting any particular trigger.
    ///
    /// The consumer sees no per-trigger identity, but the wake-up channel
    /// is guaranteed to fire; `wait` itself still returns only once some
    /// trigger has actually been reported.
    pub fn notify(&self) {
        self.inner.event.signal();
    }

    /// Block until at least one trigger has fired, then report the batch.
    ///
    /// Draining *resets* each reported trigger's pending count to zero, so
    /// a trigger appears at most once per returned set no matter how many
    /// times it was reported since the last drain. Callbacks of reported
    /// triggers run before the call returns, outside the container mutex.
    ///
    /// # Panics
    ///
    /// Panics if another thread is already waiting on this set.
    pub fn wait(&self) -> WakeUpSet {
        let _waiter = self.begin_wait();
        loop {
            self.inner.event.wait();
            let batch = self.drain();
            if batch.is_empty() {
                continue;
            }
            let wake_up: WakeUpSet = batch.iter().map(|(index, _)| *index).collect();
            for (_, callback) in &batch {
                if let Some(callback) = callback {
                    (**callback)();
                }
            }
            return wake_up;
        }
    }

    /// As [`wait`](Self::wait), but the drained batch passes through
    /// `filter` first. Callbacks run only for indices that survive; an
    /// emptied batch puts the waiter back to sleep. Pending counts
    /// consumed by a rejected entry are dropped, not restored.
    ///
    /// # Panics
    ///
    /// Panics if another thread is already waiting on this set.
    pub fn wait_filtered(
        &self,
        mut filter: impl FnMut(WakeUpSet) -> WakeUpSet,
    ) -> WakeUpSet {
        let _waiter = self.begin_wait();
        loop {
            self.inner.event.wait();
            let batch = self.drain();
            if batch.is_empty() {
                continue;
            }
            let collected: WakeUpSet = batch.iter().map(|(index, _)| *index).collect();
            let wake_up = filter(collected);
            if wake_up.is_empty() {
                continue;
            }
            for &index in &wake_up {
                if let Some((_, Some(callback))) =
                    batch.iter().find(|(batch_index, _)| *batch_index == index)
                {
                    (**callback)();
                }
            }
            return wake_up;
        }
    }

    /// Number of attached triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        let _table = self.inner.table_lock.guard();
        // SAFETY: container mutex held.
        unsafe { (*self.inner.table.get()).active.len() }
    }

    /// True when no trigger is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        let _table = self.inner.table_lock.guard();
        // SAFETY: container mutex held.
        unsafe { (*self.inner.table.get()).slots.len() }
    }

    /// One latch-and-drain pass over the active triggers.
    fn drain(&self) -> DrainBatch {
        let _table = self.inner.table_lock.guard();
        // SAFETY: container mutex held.
        let table = unsafe { &*self.inner.table.get() };
        let mut batch = DrainBatch::new();
        for &index in &table.active {
            let Some(record) = &table.slots[index as usize] else {
                continue;
            };
            if record.pending.swap(0, Ordering::AcqRel) > 0 {
                // SAFETY: container mutex held.
                let callback = unsafe { record.callback_locked() };
                batch.push((index, callback));
            }
        }
        batch
    }

    fn begin_wait(&self) -> WaiterGuard<'_> {
        assert!(
            !self.inner.draining.swap(true, Ordering::AcqRel),
            "WaitSet::wait is single-consumer; another thread is already waiting"
        );
        WaiterGuard(&self.inner)
    }
}

impl Drop for WaitSet {
    fn drop(&mut self) {
        self.inner.alive.store(false, Ordering::Release);
    }
}

/// Releases the single-consumer slot even if a callback panics.
struct WaiterGuard<'a>(&'a WaitSetInner);

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.draining.store(false, Ordering::Release);
    }
}
