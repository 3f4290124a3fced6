//! Scenario execution engine.
//!
//! Each scenario is a self-contained concurrency exercise that reports
//! what it observed instead of panicking, so a failing primitive produces
//! a diagnosable report entry rather than a dead harness.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use waitmux_core::{AutoResetEvent, Condvar, Mutex, Semaphore, TimedCondvar, WaitSet};

/// Knobs shared by every scenario.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioConfig {
    /// Multiplies iteration counts; 1 is the quick conformance run.
    pub scale: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self { scale: 1 }
    }
}

/// The result of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario identifier.
    pub name: String,
    /// Whether every observation matched the contract.
    pub passed: bool,
    /// What was observed (or what went wrong).
    pub detail: String,
    /// Wall-clock runtime.
    pub elapsed_ms: u128,
}

type ScenarioFn = fn(&ScenarioConfig) -> Result<String, String>;

const SCENARIOS: &[(&str, ScenarioFn)] = &[
    ("four-waiters-one-event", four_waiters_one_event),
    ("producer-consumer-semaphore", producer_consumer_semaphore),
    ("mutex-counter", mutex_counter),
    ("condvar-predicate", condvar_predicate),
    ("timed-wait-timeout", timed_wait_timeout),
    ("waitset-multiplex", waitset_multiplex),
];

/// Names of all registered scenarios, in execution order.
#[must_use]
pub fn scenario_names() -> Vec<&'static str> {
    SCENARIOS.iter().map(|(name, _)| *name).collect()
}

/// Run one scenario by name. Returns `None` for an unknown name.
#[must_use]
pub fn run_scenario(name: &str, config: &ScenarioConfig) -> Option<ScenarioOutcome> {
    let (_, scenario) = SCENARIOS.iter().find(|(known, _)| *known == name)?;
    Some(execute(name, *scenario, config))
}

/// Run every registered scenario.
#[must_use]
pub fn run_all(config: &ScenarioConfig) -> Vec<ScenarioOutcome> {
    SCENARIOS
        .iter()
        .map(|&(name, scenario)| execute(name, scenario, config))
        .collect()
}

fn execute(name: &str, scenario: ScenarioFn, config: &ScenarioConfig) -> ScenarioOutcome {
    let start = Instant::now();
    let result = scenario(config);
    let elapsed_ms = start.elapsed().as_millis();
    match result {
        Ok(detail) => ScenarioOutcome {
            name: name.to_string(),
            passed: true,
            detail,
            elapsed_ms,
        },
        Err(detail) => ScenarioOutcome {
            name: name.to_string(),
            passed: false,
            detail,
            elapsed_ms,
        },
    }
}

fn check(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

/// Two coalesced pre-signals plus two live signals release exactly three
/// of four waiters on an auto-reset event.
fn four_waiters_one_event(_config: &ScenarioConfig) -> Result<String, String> {
    let event = Arc::new(AutoResetEvent::new(false));
    let released = Arc::new(AtomicU32::new(0));

    event.signal();
    event.signal();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let event = Arc::clone(&event);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                event.wait();
                released.fetch_add(1, Ordering::AcqRel);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(100));
    event.signal();
    thread::sleep(Duration::from_millis(100));
    event.signal();
    thread::sleep(Duration::from_millis(200));

    let after_three = released.load(Ordering::Acquire);

    // Free the straggler before judging, so the harness never leaks a
    // parked thread.
    event.signal();
    for waiter in waiters {
        waiter.join().map_err(|_| "waiter panicked".to_string())?;
    }

    check(
        after_three == 3,
        &format!("expected 3 released waiters, observed {after_three}"),
    )?;
    Ok("3 of 4 waiters released by 4 signals (2 coalesced)".to_string())
}

/// Producer posts, consumer waits; the count returns to zero.
fn producer_consumer_semaphore(config: &ScenarioConfig) -> Result<String, String> {
    let rounds = 10_000 * config.scale as usize;
    let semaphore = Arc::new(Semaphore::new(0));

    let producer_sem = Arc::clone(&semaphore);
    let producer = thread::spawn(move || {
        for _ in 0..rounds {
            producer_sem.post(1);
        }
    });
    let consumer_sem = Arc::clone(&semaphore);
    let consumer = thread::spawn(move || {
        for _ in 0..rounds {
            consumer_sem.wait();
        }
    });

    producer.join().map_err(|_| "producer panicked".to_string())?;
    consumer.join().map_err(|_| "consumer panicked".to_string())?;

    let value = semaphore.value();
    check(value == 0, &format!("final count {value}, expected 0"))?;
    Ok(format!("{rounds} tokens produced and consumed, count back to 0"))
}

/// Balanced ±1 updates under the mutex cancel out, and an observer counter
/// never sees two threads inside the critical section.
fn mutex_counter(config: &ScenarioConfig) -> Result<String, String> {
    let pairs = 4usize;
    let iters = 10_000 * config.scale as usize;

    let lock = Arc::new(Mutex::new());
    let count = Arc::new(AtomicI64::new(0));
    let users = Arc::new(AtomicU32::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..2 * pairs)
        .map(|worker| {
            let lock = Arc::clone(&lock);
            let count = Arc::clone(&count);
            let users = Arc::clone(&users);
            let overlap = Arc::clone(&overlap);
            thread::spawn(move || {
                let delta: i64 = if worker % 2 == 0 { 1 } else { -1 };
                for _ in 0..iters {
                    lock.lock();
                    if users.fetch_add(1, Ordering::AcqRel) != 0 {
                        overlap.store(true, Ordering::Release);
                    }
                    count.fetch_add(delta, Ordering::Relaxed);
                    users.fetch_sub(1, Ordering::AcqRel);
                    lock.unlock();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| "worker panicked".to_string())?;
    }

    check(!overlap.load(Ordering::Acquire), "two threads were inside the lock at once")?;
    let final_count = count.load(Ordering::Acquire);
    check(final_count == 0, &format!("final counter {final_count}, expected 0"))?;
    Ok(format!("{} guarded updates, counter balanced", 2 * pairs * iters))
}

/// Two predicate waiters both return once the flag is set under the lock
/// and the condvar broadcasts.
fn condvar_predicate(_config: &ScenarioConfig) -> Result<String, String> {
    let cv = Arc::new(Condvar::new());
    let lock = Arc::new(Mutex::new());
    let ready = Arc::new(AtomicBool::new(false));
    let satisfied = Arc::new(AtomicU32::new(0));

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let (cv, lock, ready, satisfied) = (
                Arc::clone(&cv),
                Arc::clone(&lock),
                Arc::clone(&ready),
                Arc::clone(&satisfied),
            );
            thread::spawn(move || {
                lock.lock();
                cv.wait_while(&*lock, || ready.load(Ordering::Acquire));
                let held = !lock.try_lock();
                if ready.load(Ordering::Acquire) && held {
                    satisfied.fetch_add(1, Ordering::AcqRel);
                }
                lock.unlock();
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(100));
    lock.lock();
    ready.store(true, Ordering::Release);
    lock.unlock();
    cv.notify_all();

    for waiter in waiters {
        waiter.join().map_err(|_| "waiter panicked".to_string())?;
    }
    let satisfied = satisfied.load(Ordering::Acquire);
    check(
        satisfied == 2,
        &format!("{satisfied} waiters returned with predicate true and lock held, expected 2"),
    )?;
    Ok("both waiters returned with the flag set and the lock held".to_string())
}

/// A predicate that never becomes true times out close to its deadline,
/// with the caller's lock reacquired.
fn timed_wait_timeout(_config: &ScenarioConfig) -> Result<String, String> {
    let cv = TimedCondvar::new();
    let lock = Mutex::new();

    lock.lock();
    let start = Instant::now();
    let satisfied = cv.wait_timeout(&lock, || false, Duration::from_millis(100));
    let elapsed = start.elapsed();
    let reacquired = !lock.try_lock();
    lock.unlock();

    check(!satisfied, "timed wait reported success on a false predicate")?;
    check(
        elapsed >= Duration::from_millis(100),
        &format!("returned after {elapsed:?}, before the deadline"),
    )?;
    check(
        elapsed < Duration::from_secs(2),
        &format!("deadline overshot: {elapsed:?}"),
    )?;
    check(reacquired, "caller lock was not reacquired after the timeout")?;
    Ok(format!("timed out after {elapsed:?} holding the lock"))
}

/// Three triggers multiplexed onto one waiter; the guard trigger shuts the
/// waiter down cleanly.
fn waitset_multiplex(_config: &ScenarioConfig) -> Result<String, String> {
    let set = Arc::new(WaitSet::new(3));
    let parity_word = Arc::new(AtomicU64::new(0));
    let shutdown = Arc::new(AtomicBool::new(false));

    let always = set.add(|| true).ok_or("failed to add trigger")?;
    let parity_source = Arc::clone(&parity_word);
    let parity = set
        .add(move || parity_source.load(Ordering::Acquire) % 2 == 0)
        .ok_or("failed to add trigger")?;
    let guard_flag = Arc::clone(&shutdown);
    let guard = set
        .add(move || guard_flag.load(Ordering::Acquire))
        .ok_or("failed to add trigger")?;

    let (always_index, parity_index, guard_index) =
        (always.index(), parity.index(), guard.index());

    let waiter_set = Arc::clone(&set);
    let waiter = thread::spawn(move || {
        let mut batches = Vec::new();
        loop {
            let wake_up = waiter_set.wait();
            let finished = wake_up.contains(&guard_index);
            batches.push(wake_up);
            if finished {
                return batches;
            }
        }
    });

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(50));
        parity_word.fetch_add(1, Ordering::AcqRel);
        always.notify();
        parity.notify();
        set.notify();
    }
    thread::sleep(Duration::from_millis(50));
    shutdown.store(true, Ordering::Release);
    guard.notify();

    let batches = waiter.join().map_err(|_| "waiter panicked".to_string())?;

    for (i, batch) in batches.iter().enumerate() {
        check(!batch.is_empty(), "a wake-up batch was empty")?;
        for &index in batch {
            check(
                [always_index, parity_index, guard_index].contains(&index),
                &format!("unknown index {index} in a wake-up batch"),
            )?;
        }
        let is_last = i == batches.len() - 1;
        check(
            batch.contains(&guard_index) == is_last,
            "guard trigger fired outside the final batch",
        )?;
    }
    check(
        batches.iter().any(|batch| batch.contains(&always_index)),
        "unconditional trigger never reported",
    )?;
    Ok(format!(
        "{} wake-ups, guard delivered in the final batch",
        batches.len()
    ))
}
