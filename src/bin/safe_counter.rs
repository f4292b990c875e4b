//! A counter shared by many workers, guarded by a resource lock.
//!
//! Run with: cargo run --bin safe_counter

use colored::Colorize;
use lock_ordering::{telemetry, Counter, LockError};
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

/// One increment per task, spread over rayon's pool.
fn many_tasks(tasks: usize) -> Result<i64, LockError> {
    let counter = Counter::new();
    (0..tasks)
        .into_par_iter()
        .try_for_each(|_| counter.increment().map(|_| ()))?;
    counter.value()
}

/// A fixed set of threads, each incrementing in a tight loop.
fn hot_loop(threads: usize, per_thread: usize) -> Result<i64, LockError> {
    let counter = Arc::new(Counter::new());
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || -> Result<(), LockError> {
                for _ in 0..per_thread {
                    counter.increment()?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => eprintln!("{}", "worker panicked".red()),
        }
    }
    counter.value()
}

fn check(label: &str, expected: i64, actual: Result<i64, LockError>) {
    match actual {
        Ok(value) if value == expected => {
            println!("  {}: {} {}", label, value, "✓".green())
        }
        Ok(value) => println!("  {}: {} (expected {}) {}", label, value, expected, "✗".red()),
        Err(err) => println!("  {}: {}", label, err.to_string().red()),
    }
}

fn main() {
    if let Err(err) = telemetry::init_logging() {
        eprintln!("logging disabled: {}", err);
    }

    println!("{}", "=== 1000 Tasks, One Increment Each ===".bold());
    let started = Instant::now();
    check("final count", 1000, many_tasks(1000));
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "task run finished");

    println!("\n{}", "=== 100 Threads x 10000 Increments ===".bold());
    let started = Instant::now();
    check("final count", 1_000_000, hot_loop(100, 10_000));
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "hot loop finished");

    println!("\n=== Key Points ===");
    println!("1. Every read and write of the count goes through the lock");
    println!("2. The guard releases on drop, including early returns");
    println!("3. The counter is a keyed resource, so it can join ordered lock sets");
}
