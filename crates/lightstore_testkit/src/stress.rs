//! Stress tests for LightStore.
//!
//! These helpers drive a repository from several threads at once, with maps
//! small enough that autogrowth runs while other writers and readers are busy.

use crate::fixtures::{key_for, value_for, TestRepo};
use lightstore_core::StorageEngine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 2_000,
            threads: 4,
            value_size: 128,
        }
    }
}

/// Runs `config.threads` writers, each putting its own disjoint key range.
///
/// Thread `t` writes keys `t * operations .. (t + 1) * operations`.
pub fn stress_concurrent_writes<E: StorageEngine>(
    repo: &TestRepo<E>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                let base = (t * config.operations) as u64;
                for i in base..base + config.operations as u64 {
                    match repo.put(&key_for(i), &value_for(i, config.value_size)) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Runs writers and readers side by side.
///
/// Writers behave as in [`stress_concurrent_writes`]. Each reader repeatedly
/// opens a snapshot and checks that its count matches a full iteration, which
/// fails if a snapshot ever changes underneath it.
pub fn stress_mixed_readers_writers<E: StorageEngine>(
    repo: &TestRepo<E>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let writers_done = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed, writers_done) = (&successful, &failed, &writers_done);
            scope.spawn(move || {
                let base = (t * config.operations) as u64;
                for i in base..base + config.operations as u64 {
                    match repo.put(&key_for(i), &value_for(i, config.value_size)) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
                writers_done.fetch_add(1, Ordering::Release);
            });
        }

        for _ in 0..config.threads.max(1) / 2 + 1 {
            let (successful, failed, writers_done) = (&successful, &failed, &writers_done);
            scope.spawn(move || {
                while writers_done.load(Ordering::Acquire) < config.threads {
                    let consistent = repo.begin_read().and_then(|txn| {
                        let counted = txn.count()?;
                        let listed = txn.list()?.count() as u64;
                        Ok(counted == listed)
                    });
                    match consistent {
                        Ok(true) => successful.fetch_add(1, Ordering::Relaxed),
                        _ => failed.fetch_add(1, Ordering::Relaxed),
                    };
                    // Let growth steps in between snapshots.
                    thread::sleep(Duration::from_millis(1));
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}
