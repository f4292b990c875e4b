//! Stable identity keys for lockable resources.
//!
//! Keys are handed out once, when a resource is built, and never change.
//! They are the only thing the ordered locker sorts by.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a lockable resource. Lower keys are always locked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey(u64);

impl ResourceKey {
    pub const fn new(raw: u64) -> Self {
        ResourceKey(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Next key from the process-wide allocator.
    pub fn next() -> Self {
        GLOBAL_KEYS.next()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ResourceKey {
    fn from(raw: u64) -> Self {
        ResourceKey(raw)
    }
}

/// Monotonic key source. Every call to [`KeyAllocator::next`] returns a key
/// strictly greater than all keys it returned before.
#[derive(Debug)]
pub struct KeyAllocator {
    next: AtomicU64,
}

impl KeyAllocator {
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    pub const fn starting_at(first: u64) -> Self {
        KeyAllocator {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> ResourceKey {
        // Relaxed is enough: only uniqueness and monotonicity matter.
        ResourceKey(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for KeyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_KEYS: KeyAllocator = KeyAllocator::new();
