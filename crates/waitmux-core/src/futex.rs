//! Parking primitive: sleep-on-word, wake-N-on-word.
//!
//! A thread parks on a 32-bit atomic word only while the word holds an
//! expected value; any thread can wake up to `n` parked threads. Spurious
//! returns from [`wait`] are permitted and expected; every caller
//! re-validates its own condition after waking. No memory ordering is
//! provided beyond what the caller's own atomics install.
//!
//! All operations use `FUTEX_PRIVATE_FLAG`: the words never live in
//! memory shared across processes.

use core::sync::atomic::AtomicU32;
use std::time::Duration;

use crate::errno;
use crate::syscall;

const FUTEX_WAIT: i32 = 0;
const FUTEX_WAKE: i32 = 1;
const FUTEX_PRIVATE_FLAG: i32 = 0x80;

/// Park the calling thread while `word` holds `expected`.
///
/// Returns immediately if the word differs, on any wake targeting the
/// word, or spuriously (e.g. after a signal).
pub fn wait(word: &AtomicU32, expected: u32) {
    let word_ptr = word as *const AtomicU32 as *const u32;
    // SAFETY: word_ptr is valid and aligned for the duration of the call.
    let _ = unsafe {
        syscall::sys_futex(
            word_ptr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            0,
            0,
            0,
        )
    };
}

/// Park as [`wait`] does, for at most `timeout`.
///
/// Returns `false` only when the kernel reports the deadline expired;
/// wakes, mismatches, and spurious returns all yield `true`. Callers that
/// need a precise total deadline re-check elapsed time and call again.
pub fn wait_timeout(word: &AtomicU32, expected: u32, timeout: Duration) -> bool {
    // Kernel timespec layout: [tv_sec: i64, tv_nsec: i64].
    let ts: [i64; 2] = [
        timeout.as_secs() as i64,
        i64::from(timeout.subsec_nanos()),
    ];
    let ts_ptr = ts.as_ptr() as usize;
    let word_ptr = word as *const AtomicU32 as *const u32;
    // SAFETY: word_ptr and ts_ptr are valid and aligned for the call.
    let result = unsafe {
        syscall::sys_futex(
            word_ptr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            0,
            0,
        )
    };
    !matches!(result, Err(e) if e == errno::ETIMEDOUT)
}

/// Wake up to `n` threads parked on `word`. Returns the number actually
/// woken. Selection order is kernel-defined (FIFO-ish).
pub fn wake(word: &AtomicU32, n: u32) -> usize {
    let word_ptr = word as *const AtomicU32 as *const u32;
    // SAFETY: word_ptr is valid and aligned for the duration of the call.
    unsafe {
        syscall::sys_futex(word_ptr, FUTEX_WAKE | FUTEX_PRIVATE_FLAG, n, 0, 0, 0)
    }
    .unwrap_or(0)
}
