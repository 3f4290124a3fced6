//! Futex-based synchronization primitives.
//!
//! Everything in this crate bottoms out in one kernel facility: the futex
//! wait/wake pair on a 32-bit word (the [`futex`] module). On top of it, in
//! dependency order: a bounded counting [`Semaphore`], adaptive-spin mutexes
//! ([`Mutex`], [`IdMutex`]), an [`AutoResetEvent`] whose signed counter
//! encodes both "signaled" and the number of waiters, condition variables
//! taking an external lock ([`Condvar`], [`TimedCondvar`]), and a
//! [`WaitSet`] that multiplexes any number of application triggers onto a
//! single blocked consumer thread.
//!
//! Linux x86_64 and aarch64 only; the futex syscall is issued directly,
//! without a libc dependency.

#![deny(unsafe_code)]

pub mod errno;
#[allow(unsafe_code)]
mod syscall;

#[allow(unsafe_code)]
pub mod futex;

pub mod event;
pub mod id_mutex;
pub mod mutex;
pub mod semaphore;
pub mod timer;

#[allow(unsafe_code)]
pub mod condvar;
#[allow(unsafe_code)]
pub mod waitset;

pub use condvar::{Condvar, TimedCondvar};
pub use event::AutoResetEvent;
pub use id_mutex::{IdMutex, LockId};
pub use mutex::{Lockable, Mutex, MutexGuard};
pub use semaphore::{LightweightSemaphore, Semaphore};
pub use timer::Timer;
pub use waitset::{
    INVALID_ID, INVALID_INDEX, TriggerIndex, WaitSet, WaitToken, WakeUpSet,
};
