//! Identity-aware exclusive lock.
//!
//! The state word holds the owner's id while locked, `-1` while unlocked
//! and `-2` while contested. Blocking goes through an internal
//! [`Semaphore`] instead of the raw futex so the state word is not bound
//! to 32 bits. Re-locking by the current owner is idempotent; unlocking
//! under a foreign id is a protocol error and aborts.

use core::sync::atomic::{AtomicI64, Ordering};

use crate::semaphore::Semaphore;

/// Opaque caller identity, e.g. a thread id.
pub type LockId = u32;

const UNLOCKED: i64 = -1;
const CONTESTED: i64 = -2;

/// Default spin budget before a lock attempt parks.
pub const DEFAULT_MAX_SPIN: u32 = 1_000;

/// Exclusive lock that remembers who holds it.
pub struct IdMutex {
    state: AtomicI64,
    owner: AtomicI64,
    semaphore: Semaphore,
    max_spin: u32,
}

impl IdMutex {
    /// Lock with the default spin budget.
    #[must_use]
    pub fn new() -> Self {
        Self::with_spin(DEFAULT_MAX_SPIN)
    }

    /// Lock that spins up to `max_spin` times before parking (floored at
    /// one iteration: the first pass also carries the owner-idempotence
    /// check).
    #[must_use]
    pub fn with_spin(max_spin: u32) -> Self {
        Self {
            state: AtomicI64::new(UNLOCKED),
            owner: AtomicI64::new(UNLOCKED),
            semaphore: Semaphore::new(0),
            max_spin: max_spin.max(1),
        }
    }

    /// Acquire on behalf of `id`. A call by the current owner with the
    /// same id returns immediately without counting.
    pub fn lock(&self, id: LockId) {
        let id_state = i64::from(id);
        for _ in 0..self.max_spin {
            match self.state.compare_exchange(
                UNLOCKED,
                id_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.owner.store(id_state, Ordering::Relaxed);
                    return;
                }
                Err(observed) if observed == id_state => return,
                Err(CONTESTED) => {
                    if self.owner.load(Ordering::Relaxed) == id_state {
                        return;
                    }
                    // Contested already; park instead of spinning against
                    // threads that are themselves parked.
                    self.semaphore.wait();
                    break;
                }
                Err(_) => core::hint::spin_loop(),
            }
        }
        // Pessimistic slow path, as in the plain mutex: stamp contested,
        // park while the previous value was not unlocked.
        while self.state.swap(CONTESTED, Ordering::AcqRel) != UNLOCKED {
            self.semaphore.wait();
        }
        self.owner.store(id_state, Ordering::Relaxed);
    }

    /// Release without an identity check.
    pub fn unlock(&self) {
        self.release();
    }

    /// Release on behalf of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not the current owner; the protocol violation is
    /// fatal rather than silently corrupting the lock state.
    pub fn unlock_by(&self, id: LockId) {
        let owner = self.owner.load(Ordering::Relaxed);
        if owner != i64::from(id) {
            panic!("unlock by id {id} but lock owner is {owner}");
        }
        self.release();
    }

    /// The id the lock is currently held under, if any. Racy by nature;
    /// only the owner itself can rely on the answer.
    #[must_use]
    pub fn current_owner(&self) -> Option<LockId> {
        let owner = self.owner.load(Ordering::Relaxed);
        u32::try_from(owner).ok()
    }

    fn release(&self) {
        // Cleared before the exchange so a new owner's store wins any race.
        self.owner.store(UNLOCKED, Ordering::Relaxed);
        if self.state.swap(UNLOCKED, Ordering::AcqRel) == CONTESTED {
            self.semaphore.post(1);
        }
    }
}

impl Default for IdMutex {
    fn default() -> Self {
        Self::new()
    }
}
