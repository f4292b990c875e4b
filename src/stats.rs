//! Lock-free counters describing what an `OrderedLocker` has done.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LockStats {
    acquired: AtomicU64,
    released: AtomicU64,
    cancelled: AtomicU64,
    unavailable: AtomicU64,
    rejected: AtomicU64,
    would_block: AtomicU64,
}

/// Point-in-time copy of [`LockStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub acquired: u64,
    pub released: u64,
    pub cancelled: u64,
    pub unavailable: u64,
    pub rejected: u64,
    pub would_block: u64,
}

impl StatsSnapshot {
    /// Sessions that are currently holding their locks.
    pub fn in_flight(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }

    pub fn aborted(&self) -> u64 {
        self.cancelled + self.unavailable
    }
}

impl LockStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_would_block(&self) {
        self.would_block.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            would_block: self.would_block.load(Ordering::Relaxed),
        }
    }
}
