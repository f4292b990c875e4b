//! Random transfers between shared accounts from many threads at once.
//!
//! Every transfer locks both accounts through the ordered locker, in whatever
//! order the random pick produced. The run fails if the total balance changes
//! or if workers stop making progress.
//!
//! Run with: cargo run --bin transfer_stress
//! Optional config: LOCK_ORDERING_CONFIG=/path/to/locker.toml

use colored::Colorize;
use crossbeam::channel::{unbounded, RecvTimeoutError};
use lock_ordering::{telemetry, LockError, LockerConfig, OrderedLocker, Resource};
use rand::Rng;
use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const ACCOUNTS: usize = 16;
const OPENING_BALANCE: i64 = 1_000;
const TRANSFERS_PER_WORKER: usize = 20_000;
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

fn load_config() -> LockerConfig {
    match env::var("LOCK_ORDERING_CONFIG") {
        Ok(path) => match LockerConfig::from_file(Path::new(&path)) {
            Ok(config) => {
                info!(path = %path, "loaded locker config");
                config
            }
            Err(err) => {
                warn!(path = %path, error = %err, "falling back to default config");
                LockerConfig::default()
            }
        },
        Err(_) => LockerConfig::default(),
    }
}

/// Moves a random amount between two distinct random accounts.
fn transfer(
    locker: &OrderedLocker,
    accounts: &[Resource<i64>],
    rng: &mut impl Rng,
) -> Result<(), LockError> {
    let from = rng.gen_range(0..accounts.len());
    let mut to = rng.gen_range(0..accounts.len() - 1);
    if to >= from {
        to += 1;
    }
    let (from, to) = (&accounts[from], &accounts[to]);

    let mut handle = locker.acquire_all(&[from, to])?;
    let amount = rng.gen_range(0..=50);
    if let Some(balance) = handle.get_mut(from.key()) {
        if *balance < amount {
            return Ok(());
        }
        *balance -= amount;
    }
    if let Some(balance) = handle.get_mut(to.key()) {
        *balance += amount;
    }
    Ok(())
}

fn main() {
    if let Err(err) = telemetry::init_logging() {
        eprintln!("logging disabled: {}", err);
    }

    let locker = Arc::new(OrderedLocker::new(load_config()));
    let accounts: Arc<Vec<Resource<i64>>> =
        Arc::new((0..ACCOUNTS).map(|_| Resource::new(OPENING_BALANCE)).collect());
    let workers = num_cpus::get().max(2);

    println!("{}", "=== Transfer Stress ===".bold());
    println!(
        "  {} accounts, {} workers, {} transfers each",
        ACCOUNTS, workers, TRANSFERS_PER_WORKER
    );

    let (done_tx, done_rx) = unbounded();
    let started = Instant::now();
    for worker in 0..workers {
        let locker = Arc::clone(&locker);
        let accounts = Arc::clone(&accounts);
        let done_tx = done_tx.clone();
        thread::Builder::new()
            .name(format!("transfer-{}", worker))
            .spawn(move || {
                let mut rng = rand::thread_rng();
                let mut failures = 0usize;
                for _ in 0..TRANSFERS_PER_WORKER {
                    if let Err(err) = transfer(&locker, &accounts, &mut rng) {
                        error!(worker, error = %err, "transfer failed");
                        failures += 1;
                    }
                }
                // The receiver only goes away if main already gave up.
                let _ = done_tx.send(failures);
            })
            .unwrap_or_else(|err| {
                eprintln!("{}", format!("failed to spawn worker: {}", err).red());
                process::exit(1);
            });
    }
    drop(done_tx);

    let mut failures = 0;
    for _ in 0..workers {
        match done_rx.recv_timeout(STALL_TIMEOUT) {
            Ok(count) => failures += count,
            Err(RecvTimeoutError::Timeout) => {
                println!("{}", "workers stalled: possible deadlock".red().bold());
                process::exit(1);
            }
            Err(RecvTimeoutError::Disconnected) => {
                println!("{}", "a worker exited without reporting".red());
                process::exit(1);
            }
        }
    }

    let total: i64 = accounts
        .iter()
        .map(|account| account.lock().map(|balance| *balance).unwrap_or(0))
        .sum();
    let expected = OPENING_BALANCE * ACCOUNTS as i64;

    println!("  elapsed: {:?}", started.elapsed());
    println!("  failed transfers: {}", failures);
    if total == expected {
        println!("  total balance: {} {}", total, "✓ conserved".green());
    } else {
        println!("  total balance: {} (expected {}) {}", total, expected, "✗".red());
    }

    match serde_json::to_string_pretty(&locker.stats()) {
        Ok(json) => println!("  stats:\n{}", json),
        Err(err) => eprintln!("could not encode stats: {}", err),
    }

    if total != expected || failures > 0 {
        process::exit(1);
    }
}
