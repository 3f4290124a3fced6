//! Mutex hot-path microbenchmarks.
//!
//! Captures uncontended lock/unlock and try_lock overhead for the default
//! and the spinless configuration, with percentile summaries.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use waitmux_bench::BenchStats;
use waitmux_core::Mutex;

fn bench_lock_unlock(c: &mut Criterion) {
    for (label, lock) in [("default_spin", Mutex::new()), ("zero_spin", Mutex::with_spin(0))] {
        // Warm the lock word into cache before sampling.
        for _ in 0..10_000 {
            lock.lock();
            lock.unlock();
        }

        let stats = RefCell::new(BenchStats::default());
        let mut group = c.benchmark_group("mutex_hotpath");
        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("lock_unlock", label), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    lock.lock();
                    black_box(&lock);
                    lock.unlock();
                }
                let dur = start.elapsed().max(Duration::from_nanos(1));
                stats.borrow_mut().record(iters, dur);
                dur
            });
        });
        group.finish();
        stats.borrow().report(label, "lock_unlock");
    }
}

fn bench_try_lock(c: &mut Criterion) {
    let lock = Mutex::new();
    for _ in 0..10_000 {
        assert!(lock.try_lock());
        lock.unlock();
    }

    let stats = RefCell::new(BenchStats::default());
    let mut group = c.benchmark_group("mutex_hotpath");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("try_lock", "default_spin"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let acquired = lock.try_lock();
                black_box(acquired);
                lock.unlock();
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));
            stats.borrow_mut().record(iters, dur);
            dur
        });
    });
    group.finish();
    stats.borrow().report("default_spin", "try_lock");
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(80);
    targets = bench_lock_unlock, bench_try_lock
);
criterion_main!(benches);
