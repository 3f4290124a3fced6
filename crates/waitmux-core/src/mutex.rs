//! Futex-backed mutual exclusion with a bounded spin prelude.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::futex;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTESTED: u32 = 2;

/// Default spin budget before a lock attempt parks.
pub const DEFAULT_MAX_SPIN: u32 = 100;

/// The seam the condition variables are generic over: anything that can be
/// released before parking and reacquired after waking.
pub trait Lockable {
    fn lock(&self);
    fn unlock(&self);
}

/// Exclusive lock over a three-state futex word.
///
/// States: unlocked, locked, contested. A contested lock stays contested
/// until the holder unlocks, even when an acquirer slips in without ever
/// parking; the pessimism costs one redundant wake at the next unlock but
/// closes the missed-wake window entirely.
pub struct Mutex {
    state: AtomicU32,
    max_spin: u32,
}

impl Mutex {
    /// Mutex with the default spin budget.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_spin(DEFAULT_MAX_SPIN)
    }

    /// Mutex that spins up to `max_spin` times before parking. Zero is
    /// valid: every contended acquisition then parks immediately.
    #[must_use]
    pub const fn with_spin(max_spin: u32) -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
            max_spin,
        }
    }

    /// Acquire without blocking. Returns `false` if the lock is held.
    #[must_use]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire, spinning up to the budget and then parking.
    pub fn lock(&self) {
        for _ in 0..self.max_spin {
            match self.state.compare_exchange(
                UNLOCKED,
                LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                // Someone is already parked; spinning further would only
                // starve them. Park right away.
                Err(CONTESTED) => {
                    futex::wait(&self.state, CONTESTED);
                    break;
                }
                Err(_) => core::hint::spin_loop(),
            }
        }
        // Pessimistic slow path: stamp the lock contested and park while
        // the previous holder has not released it. A false-positive
        // contested stamp is corrected by the extra wake at unlock.
        while self.state.swap(CONTESTED, Ordering::Acquire) != UNLOCKED {
            futex::wait(&self.state, CONTESTED);
        }
    }

    /// Release; wakes one parked thread if the lock was contested.
    pub fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTESTED {
            futex::wake(&self.state, 1);
        }
    }

    /// Acquire and return a guard that releases on drop.
    #[must_use]
    pub fn guard(&self) -> MutexGuard<'_> {
        self.lock();
        MutexGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockable for Mutex {
    fn lock(&self) {
        Mutex::lock(self);
    }

    fn unlock(&self) {
        Mutex::unlock(self);
    }
}

/// Scope-bound release for [`Mutex::guard`]. Not sendable: the unlock must
/// happen on the locking thread.
pub struct MutexGuard<'a> {
    lock: &'a Mutex,
    _not_send: PhantomData<*mut ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
