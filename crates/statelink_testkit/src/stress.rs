//! Stress helpers for the primary fan-out.
//!
//! These verify that replicas converge when many dispatches race each other.

use crate::fixtures::{counter_primary, without_marker};
use crate::memory::{settle, MemoryHub, TestReplica};
use statelink_store::{Action, StateContainer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total dispatches performed.
    pub total_ops: usize,
    /// Replicas whose tree matched the primary at the end.
    pub converged_replicas: usize,
    /// Replicas that were checked.
    pub replicas: usize,
    /// Total duration.
    pub duration: Duration,
    /// Dispatches per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(total_ops: usize, converged: usize, replicas: usize, duration: Duration) -> Self {
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total_ops as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops,
            converged_replicas: converged,
            replicas,
            duration,
            ops_per_second,
        }
    }

    /// Returns true if every replica converged.
    pub fn all_converged(&self) -> bool {
        self.converged_replicas == self.replicas
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Dispatches: {}", self.total_ops);
        println!("Converged: {}/{}", self.converged_replicas, self.replicas);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} dispatches/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of dispatches per thread.
    pub operations: usize,
    /// Number of dispatching threads.
    pub threads: usize,
    /// Number of replicas attached to the primary.
    pub replicas: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 500,
            threads: 4,
            replicas: 3,
        }
    }
}

/// Dispatches counter increments from several threads at once, then settles
/// every replica and compares it with the primary.
pub fn stress_concurrent_dispatch(config: &StressConfig) -> StressTestResult {
    let primary = counter_primary();
    let hub = MemoryHub::new(Arc::clone(&primary));
    let mut replicas: Vec<_> = (0..config.replicas)
        .map(|_| TestReplica::start(&hub))
        .collect();
    settle(&hub, &mut replicas);

    let dispatched = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let primary = Arc::clone(&primary);
            let dispatched = Arc::clone(&dispatched);
            let operations = config.operations;
            thread::spawn(move || {
                for _ in 0..operations {
                    primary.dispatch(Action::new("counter/increment"));
                    dispatched.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    let duration = start.elapsed();

    settle(&hub, &mut replicas);
    let expected = primary.get_state();
    let converged = replicas
        .iter()
        .filter(|r| without_marker(&r.state()) == *expected)
        .count();

    StressTestResult::new(
        dispatched.load(Ordering::Relaxed),
        converged,
        replicas.len(),
        duration,
    )
}

/// Interleaves dispatches with replicas dropping and reconnecting.
pub fn stress_reconnect_churn(config: &StressConfig) -> StressTestResult {
    let primary = counter_primary();
    let hub = MemoryHub::new(Arc::clone(&primary));
    let mut replicas: Vec<_> = (0..config.replicas)
        .map(|_| TestReplica::start(&hub))
        .collect();
    settle(&hub, &mut replicas);

    let start = Instant::now();
    let mut total = 0;
    for i in 0..config.operations {
        primary.dispatch(Action::new("counter/increment"));
        total += 1;

        if i % 7 == 0 && !replicas.is_empty() {
            let victim = i % replicas.len();
            if let Some(handle) = replicas[victim].session.handle_id() {
                hub.drop_connection(handle);
            }
        }
        if i % 3 == 0 {
            settle(&hub, &mut replicas);
        }
    }
    let duration = start.elapsed();

    settle(&hub, &mut replicas);
    let expected = primary.get_state();
    let converged = replicas
        .iter()
        .filter(|r| without_marker(&r.state()) == *expected)
        .count();

    StressTestResult::new(total, converged, replicas.len(), duration)
}
