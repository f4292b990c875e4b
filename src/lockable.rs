//! The seam between the ordered locker and whatever it locks.

use crate::error::LockError;
use crate::key::ResourceKey;
use crate::wait::WaitPolicy;

/// A resource with a mutual-exclusion primitive and a stable identity key.
///
/// Implementations must return the same key for the whole lifetime of the
/// value, and must not allow two holders at once. The lock is not tied to the
/// thread that took it.
pub trait Lockable {
    fn identity_key(&self) -> ResourceKey;

    /// Blocks until the lock is taken or `wait` says to give up.
    ///
    /// Fails with `ResourceUnavailable` once the resource is invalidated and
    /// with `Cancelled` when `wait` is interrupted.
    fn lock(&self, wait: &WaitPolicy) -> Result<(), LockError>;

    /// Takes the lock only if it is free right now.
    fn try_lock(&self) -> Result<bool, LockError>;

    /// # Safety
    /// The caller must currently hold the lock, taken through `lock` or
    /// `try_lock`, and must not use it again after this call.
    unsafe fn unlock(&self);
}
