#![cfg(target_os = "linux")]

//! Threaded wait-set tests: the full multiplex scenario, latching under
//! concurrency, and guarded shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use waitmux_core::{TriggerIndex, WaitSet, WakeUpSet};

#[test]
fn multiplexed_triggers_with_guarded_shutdown() {
    let set = Arc::new(WaitSet::new(3));

    let a = Arc::new(AtomicU64::new(0));
    let b = Arc::new(AtomicU64::new(0));
    let shutdown = Arc::new(AtomicBool::new(false));

    let always = set.add(|| true).unwrap();
    let (pa, pb) = (Arc::clone(&a), Arc::clone(&b));
    let parity = set
        .add(move || pa.load(Ordering::Acquire) == pb.load(Ordering::Acquire))
        .unwrap();
    let guard_flag = Arc::clone(&shutdown);
    let guard = set
        .add(move || guard_flag.load(Ordering::Acquire))
        .unwrap();

    let (always_index, parity_index, guard_index) =
        (always.index(), parity.index(), guard.index());

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || {
        let mut batches: Vec<WakeUpSet> = Vec::new();
        loop {
            let wake_up = waiter_set.wait();
            let finished = wake_up.contains(&guard_index);
            batches.push(wake_up);
            if finished {
                return batches;
            }
        }
    });

    // Five rounds of reporting; only `b` toggles, so the parity condition
    // matches on alternating rounds and those notifies are dropped on the
    // others.
    for _ in 0..5 {
        thread::sleep(Duration::from_millis(50));
        b.fetch_xor(1, Ordering::AcqRel);
        always.notify();
        parity.notify();
        set.notify();
    }

    thread::sleep(Duration::from_millis(50));
    shutdown.store(true, Ordering::Release);
    guard.notify();

    let batches = waiter.join().unwrap();
    assert!(!batches.is_empty());

    for (i, batch) in batches.iter().enumerate() {
        // Every wake-up is non-empty and only ever names known triggers.
        assert!(!batch.is_empty());
        for &index in batch {
            assert!([always_index, parity_index, guard_index].contains(&index));
        }
        // The guard appears exactly once, in the final batch.
        assert_eq!(batch.contains(&guard_index), i == batches.len() - 1);
    }
    // The unconditional trigger got through at least once, and so did the
    // parity trigger on one of its matching rounds.
    assert!(batches.iter().any(|batch| batch.contains(&always_index)));
    assert!(batches.iter().any(|batch| batch.contains(&parity_index)));
}

#[test]
fn concurrent_notifiers_collapse_into_single_emissions() {
    const NOTIFIERS: usize = 4;
    const REPORTS: usize = 1_000;

    let set = Arc::new(WaitSet::new(2));
    let trigger = set.add(|| true).unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));
    let guard_flag = Arc::clone(&shutdown);
    let guard = set
        .add(move || guard_flag.load(Ordering::Acquire))
        .unwrap();
    let (trigger_index, guard_index) = (trigger.index(), guard.index());

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || {
        let mut emissions = 0u64;
        loop {
            let wake_up = waiter_set.wait();
            // Latching: one drain reports a trigger at most once.
            let trigger_hits = wake_up
                .iter()
                .filter(|&&index| index == trigger_index)
                .count();
            assert!(trigger_hits <= 1);
            emissions += trigger_hits as u64;
            if wake_up.contains(&guard_index) {
                return emissions;
            }
        }
    });

    let mut notifiers = Vec::with_capacity(NOTIFIERS);
    for _ in 0..NOTIFIERS {
        let token = trigger.clone();
        notifiers.push(thread::spawn(move || {
            for _ in 0..REPORTS {
                token.notify();
            }
        }));
    }
    for n in notifiers {
        n.join().unwrap();
    }

    shutdown.store(true, Ordering::Release);
    guard.notify();

    let emissions = waiter.join().unwrap();
    // Thousands of reports collapse into far fewer wake-ups, but at least
    // one made it through.
    assert!(emissions >= 1);
    assert!(emissions <= (NOTIFIERS * REPORTS) as u64);
}

#[test]
fn callbacks_fire_on_the_waiter_thread_outside_the_scan() {
    let set = Arc::new(WaitSet::new(2));
    let calls = Arc::new(AtomicU32::new(0));

    let counted = Arc::clone(&calls);
    let ticker = set
        .add_with_callback(
            || true,
            move || {
                counted.fetch_add(1, Ordering::AcqRel);
            },
        )
        .unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let guard_flag = Arc::clone(&shutdown);
    let guard = set
        .add(move || guard_flag.load(Ordering::Acquire))
        .unwrap();
    let guard_index = guard.index();

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || loop {
        if waiter_set.wait().contains(&guard_index) {
            return;
        }
    });

    for _ in 0..3 {
        ticker.notify();
        thread::sleep(Duration::from_millis(50));
    }

    shutdown.store(true, Ordering::Release);
    guard.notify();
    waiter.join().unwrap();

    let calls = calls.load(Ordering::Acquire);
    assert!(calls >= 1 && calls <= 4, "callback ran {calls} times");
}

#[test]
fn filtered_wait_suppresses_and_reorders_nothing_it_keeps() {
    let set = Arc::new(WaitSet::new(3));
    let noisy = set.add(|| true).unwrap();
    let wanted = set.add(|| true).unwrap();
    let wanted_index: TriggerIndex = wanted.index();

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || {
        waiter_set.wait_filtered(|batch| {
            batch
                .into_iter()
                .filter(|&index| index == wanted_index)
                .collect()
        })
    });

    thread::sleep(Duration::from_millis(50));
    noisy.notify();
    thread::sleep(Duration::from_millis(50));
    noisy.notify();
    wanted.notify();

    let wake_up = waiter.join().unwrap();
    assert_eq!(wake_up, vec![wanted_index]);
}

#[test]
fn detach_during_live_reporting_is_safe() {
    let set = Arc::new(WaitSet::new(2));
    let churn = set.add(|| true).unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));
    let guard_flag = Arc::clone(&shutdown);
    let guard = set
        .add(move || guard_flag.load(Ordering::Acquire))
        .unwrap();
    let guard_index = guard.index();

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || loop {
        if waiter_set.wait().contains(&guard_index) {
            return;
        }
    });

    // A clone keeps notifying while the original binding is removed;
    // the post-detach reports must be silently dropped.
    let clone = churn.clone();
    let hammer = thread::spawn(move || {
        for _ in 0..10_000 {
            clone.notify();
        }
    });
    thread::sleep(Duration::from_millis(5));
    assert!(set.remove_token(&churn));
    hammer.join().unwrap();

    shutdown.store(true, Ordering::Release);
    guard.notify();
    waiter.join().unwrap();
    assert_eq!(set.len(), 1);
}
