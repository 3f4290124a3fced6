//! One-shot timer over a timed futex wait.
//!
//! A watcher thread parks on a three-state disarm word until the deadline
//! or a disarm, whichever comes first. The word also arbitrates the
//! fire/disarm race: whoever moves it away from `ARMED` first wins, so the
//! callback runs at most once and never after a successful disarm.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::futex;

const ARMED: u32 = 0;
const DISARMED: u32 = 1;
const FIRED: u32 = 2;

/// One-shot deadline with a callback.
pub struct Timer {
    word: Arc<AtomicU32>,
    watcher: Option<JoinHandle<()>>,
}

impl Timer {
    /// Arm a timer that runs `callback` once `deadline` has elapsed,
    /// unless [`disarm`](Self::disarm) wins the race first.
    pub fn one_shot<F>(deadline: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let word = Arc::new(AtomicU32::new(ARMED));
        let watcher_word = Arc::clone(&word);
        let watcher = thread::spawn(move || {
            let start = Instant::now();
            loop {
                if watcher_word.load(Ordering::Acquire) != ARMED {
                    return;
                }
                let elapsed = start.elapsed();
                if elapsed >= deadline {
                    break;
                }
                // Early returns here are fine: the loop re-checks both the
                // word and the remaining time.
                let _ = futex::wait_timeout(&watcher_word, ARMED, deadline - elapsed);
            }
            if watcher_word
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                callback();
            }
        });
        Self {
            word,
            watcher: Some(watcher),
        }
    }

    /// True once the deadline passed and the callback claimed the timer.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.word.load(Ordering::Acquire) == FIRED
    }

    /// Cancel the timer. Returns `true` if the cancellation won: the
    /// callback has not run and never will. `false` means the callback
    /// already claimed the timer.
    pub fn disarm(&self) -> bool {
        let disarmed = self
            .word
            .compare_exchange(ARMED, DISARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if disarmed {
            futex::wake(&self.word, 1);
        }
        disarmed
    }
}

impl Drop for Timer {
    /// Disarms and joins the watcher; after drop neither the callback nor
    /// the watcher thread can be running.
    fn drop(&mut self) {
        self.disarm();
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}
