//! Two threads sum the same pair of values, passing them in opposite order.
//!
//! Run with: cargo run --bin deadlock_demo

use colored::Colorize;
use crossbeam::channel::unbounded;
use lock_ordering::{telemetry, LockError, OrderedLocker, Resource, WaitPolicy};
use std::thread;
use std::time::Duration;
use tracing::info;

const HOLD_TIME: Duration = Duration::from_millis(200);
const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Part 1: Nested locking in argument order (deadlocks)
// =============================================================================

/// Locks `v1` then `v2`. With `(a, b)` and `(b, a)` running at once, each
/// thread holds one lock and waits for the other. The timeout on the second
/// lock is only there so the demo can report the deadlock and exit.
fn print_sum_naive(v1: &Resource<i32>, v2: &Resource<i32>) -> Result<i32, LockError> {
    let first = v1.lock()?;
    thread::sleep(HOLD_TIME);
    let second = v2.lock_with(&WaitPolicy::timeout(DEADLOCK_TIMEOUT))?;
    Ok(*first + *second)
}

// =============================================================================
// Part 2: Ordered acquisition (cannot deadlock)
// =============================================================================

fn print_sum_ordered(
    locker: &OrderedLocker,
    v1: &Resource<i32>,
    v2: &Resource<i32>,
) -> Result<i32, LockError> {
    let handle = locker.acquire_all(&[v1, v2])?;
    thread::sleep(HOLD_TIME);
    let sum = handle.values().map(|(_, value)| *value).sum();
    Ok(sum)
}

fn run_pair<F>(a: &Resource<i32>, b: &Resource<i32>, sum: F) -> Vec<(&'static str, Result<i32, LockError>)>
where
    F: Fn(&Resource<i32>, &Resource<i32>) -> Result<i32, LockError> + Sync,
{
    let (tx, rx) = unbounded();
    thread::scope(|s| {
        let tx1 = tx.clone();
        let sum = &sum;
        s.spawn(move || tx1.send(("sum(a, b)", sum(a, b))));
        s.spawn(move || tx.send(("sum(b, a)", sum(b, a))));
    });
    rx.iter().collect()
}

fn report(results: &[(&str, Result<i32, LockError>)]) {
    for (label, result) in results {
        match result {
            Ok(sum) => println!("  {} -> {}", label, format!("sum={}", sum).green()),
            Err(err) if err.is_timeout() => {
                println!("  {} -> {}", label, format!("stuck: {}", err).red())
            }
            Err(err) => println!("  {} -> {}", label, format!("error: {}", err).yellow()),
        }
    }
}

fn main() {
    if let Err(err) = telemetry::init_logging() {
        eprintln!("logging disabled: {}", err);
    }

    let a = Resource::new(3);
    let b = Resource::new(4);
    info!(a = %a.key(), b = %b.key(), "resources created");

    println!("{}", "=== Nested Locks in Argument Order ===".bold());
    let naive = run_pair(&a, &b, print_sum_naive);
    report(&naive);
    if naive.iter().any(|(_, result)| result.is_err()) {
        println!("  {}", "circular wait: each thread held the lock the other needed".red());
    }

    println!("\n{}", "=== Locks Sorted by Resource Key ===".bold());
    let locker = OrderedLocker::default();
    let ordered = run_pair(&a, &b, |v1, v2| print_sum_ordered(&locker, v1, v2));
    report(&ordered);
    println!("  stats: {:?}", locker.stats());

    println!("\n=== Key Points ===");
    println!("1. Deadlock needs a cycle of threads each waiting on the next");
    println!("2. One global lock order makes that cycle impossible");
    println!("3. Order by a key fixed at creation, never by address or value");
    println!("4. Release in reverse order; the handle does it on drop");
}
