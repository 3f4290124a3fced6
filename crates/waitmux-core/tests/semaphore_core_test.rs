#![cfg(target_os = "linux")]

//! Threaded semaphore tests: token accounting, saturation, and the
//! producer/consumer round trip.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use waitmux_core::{LightweightSemaphore, Semaphore};

#[test]
fn producer_consumer_completes_and_balances() {
    let semaphore = Arc::new(Semaphore::new(0));

    let producer_sem = Arc::clone(&semaphore);
    let producer = thread::spawn(move || {
        for _ in 0..10 {
            assert_eq!(producer_sem.post(1), 1);
        }
    });
    let consumer_sem = Arc::clone(&semaphore);
    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            consumer_sem.wait();
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    assert_eq!(semaphore.value(), 0);
}

#[test]
fn many_producers_many_consumers_conserve_tokens() {
    const PAIRS: usize = 4;
    const ITERS: usize = 50_000;

    let semaphore = Arc::new(Semaphore::new(0));
    let mut handles = Vec::with_capacity(2 * PAIRS);
    for _ in 0..PAIRS {
        let sem = Arc::clone(&semaphore);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                sem.wait();
            }
        }));
        let sem = Arc::clone(&semaphore);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                assert_eq!(sem.post(1), 1);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    // Every post was matched by exactly one returned wait.
    assert_eq!(semaphore.value(), 0);
}

#[test]
fn batched_posts_cover_later_waits() {
    let semaphore = Semaphore::new(0);
    assert_eq!(semaphore.post(4), 4);
    assert_eq!(semaphore.post(3), 3);
    // All seven waits complete without further posts.
    for _ in 0..7 {
        semaphore.wait();
    }
    assert_eq!(semaphore.value(), 0);
}

#[test]
fn saturating_post_reports_the_shortfall() {
    let semaphore = Semaphore::with_max(0, 8);
    assert_eq!(semaphore.post(6), 6);
    assert_eq!(semaphore.post(6), 2);
    assert_eq!(semaphore.value(), 8);
    assert!(semaphore.try_wait());
    assert_eq!(semaphore.value(), 7);
}

#[test]
fn wait_never_returns_without_a_matching_token() {
    // A waiter parked on an empty semaphore stays parked until the post.
    let semaphore = Arc::new(Semaphore::new(0));
    let started = Arc::new(AtomicU32::new(0));
    let finished = Arc::new(AtomicU32::new(0));

    let (sem, started2, finished2) = (
        Arc::clone(&semaphore),
        Arc::clone(&started),
        Arc::clone(&finished),
    );
    let waiter = thread::spawn(move || {
        started2.store(1, Ordering::Release);
        sem.wait();
        finished2.store(1, Ordering::Release);
    });

    while started.load(Ordering::Acquire) == 0 {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(100));
    assert_eq!(finished.load(Ordering::Acquire), 0);

    assert_eq!(semaphore.post(1), 1);
    waiter.join().unwrap();
    assert_eq!(finished.load(Ordering::Acquire), 1);
}

#[test]
fn lightweight_semaphore_balances_under_contention() {
    const PAIRS: usize = 4;
    const ITERS: usize = 20_000;

    let semaphore = Arc::new(LightweightSemaphore::new(0));
    let mut handles = Vec::with_capacity(2 * PAIRS);
    for _ in 0..PAIRS {
        let sem = Arc::clone(&semaphore);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                sem.wait();
            }
        }));
        let sem = Arc::clone(&semaphore);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                sem.post(1);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert!(!semaphore.try_wait());
}
