//! A value guarded by a blocking lock with a stable identity key.
//!
//! `Resource<T>` is the standard [`Lockable`]. It can be locked on its own
//! through [`Resource::lock`], or together with other resources through the
//! ordered locker. The lock state lives in a small `Mutex<Gate>` with a
//! `Condvar` to park waiters, so the lock can be held across threads and
//! waits can be timed out, cancelled, or broken by [`Resource::destroy`].

use crate::error::LockError;
use crate::key::{KeyAllocator, ResourceKey};
use crate::lockable::Lockable;
use crate::wait::WaitPolicy;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

#[derive(Debug, Default)]
struct Gate {
    held: bool,
    destroyed: bool,
}

pub struct Resource<T> {
    key: ResourceKey,
    gate: Mutex<Gate>,
    released: Condvar,
    data: UnsafeCell<T>,
}

// Safety: `data` is only reached through a guard or a scoped handle, and
// both exist only while `gate.held` is set by their owner.
unsafe impl<T: Send> Sync for Resource<T> {}

impl<T> Resource<T> {
    /// Creates a resource keyed from the process-wide allocator.
    pub fn new(value: T) -> Self {
        Self::with_key(ResourceKey::next(), value)
    }

    pub fn with_allocator(keys: &KeyAllocator, value: T) -> Self {
        Self::with_key(keys.next(), value)
    }

    /// Creates a resource with a caller-chosen key. Two resources sharing a
    /// key cannot be locked together.
    pub fn with_key(key: ResourceKey, value: T) -> Self {
        Resource {
            key,
            gate: Mutex::new(Gate::default()),
            released: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Blocks until the resource is free.
    pub fn lock(&self) -> Result<ResourceGuard<'_, T>, LockError> {
        self.lock_with(&WaitPolicy::forever())
    }

    pub fn lock_with(&self, wait: &WaitPolicy) -> Result<ResourceGuard<'_, T>, LockError> {
        self.acquire(wait)?;
        Ok(ResourceGuard::new(self))
    }

    /// Returns `Ok(None)` when someone else holds the lock.
    pub fn try_lock(&self) -> Result<Option<ResourceGuard<'_, T>>, LockError> {
        Ok(self.try_acquire()?.then(|| ResourceGuard::new(self)))
    }

    /// Invalidates the resource. Current and future waiters fail with
    /// `ResourceUnavailable`; a current holder keeps its lock until it
    /// releases normally.
    pub fn destroy(&self) {
        let mut gate = self.gate();
        if !gate.destroyed {
            gate.destroyed = true;
            warn!(key = %self.key, held = gate.held, "resource destroyed");
        }
        drop(gate);
        self.released.notify_all();
    }

    pub fn is_destroyed(&self) -> bool {
        self.gate().destroyed
    }

    pub fn is_locked(&self) -> bool {
        self.gate().held
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    pub(crate) fn data_ptr(&self) -> *mut T {
        self.data.get()
    }

    // The gate only holds two flags, so a poisoned gate is still consistent.
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, wait: &WaitPolicy) -> Result<(), LockError> {
        let mut gate = self.gate();
        loop {
            if gate.destroyed {
                return Err(LockError::ResourceUnavailable { key: self.key });
            }
            if !gate.held {
                gate.held = true;
                trace!(key = %self.key, "locked");
                return Ok(());
            }
            if let Some(reason) = wait.interrupted() {
                return Err(LockError::Cancelled {
                    key: self.key,
                    reason,
                });
            }
            gate = match wait.next_slice() {
                None => self
                    .released
                    .wait(gate)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(slice) => {
                    self.released
                        .wait_timeout(gate, slice)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn try_acquire(&self) -> Result<bool, LockError> {
        let mut gate = self.gate();
        if gate.destroyed {
            return Err(LockError::ResourceUnavailable { key: self.key });
        }
        if gate.held {
            return Ok(false);
        }
        gate.held = true;
        trace!(key = %self.key, "locked (try)");
        Ok(true)
    }

    fn release(&self) {
        let mut gate = self.gate();
        gate.held = false;
        drop(gate);
        trace!(key = %self.key, "unlocked");
        self.released.notify_one();
    }
}

impl<T> Lockable for Resource<T> {
    fn identity_key(&self) -> ResourceKey {
        self.key
    }

    fn lock(&self, wait: &WaitPolicy) -> Result<(), LockError> {
        self.acquire(wait)
    }

    fn try_lock(&self) -> Result<bool, LockError> {
        self.try_acquire()
    }

    unsafe fn unlock(&self) {
        self.release();
    }
}

impl<T: Default> Default for Resource<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gate = self.gate();
        f.debug_struct("Resource")
            .field("key", &self.key)
            .field("held", &gate.held)
            .field("destroyed", &gate.destroyed)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one resource; unlocks on drop.
#[derive(Debug)]
pub struct ResourceGuard<'a, T> {
    resource: &'a Resource<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> ResourceGuard<'a, T> {
    fn new(resource: &'a Resource<T>) -> Self {
        ResourceGuard {
            resource,
            _marker: PhantomData,
        }
    }

    pub fn key(guard: &Self) -> ResourceKey {
        guard.resource.key
    }
}

impl<T> Deref for ResourceGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard owns the lock.
        unsafe { &*self.resource.data_ptr() }
    }
}

impl<T> DerefMut for ResourceGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: this guard owns the lock.
        unsafe { &mut *self.resource.data_ptr() }
    }
}

impl<T> Drop for ResourceGuard<'_, T> {
    fn drop(&mut self) {
        self.resource.release();
    }
}
