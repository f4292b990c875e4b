//! The scoped handle returned by a successful ordered acquisition.

use crate::key::ResourceKey;
use crate::lockable::Lockable;
use crate::resource::Resource;
use crate::session::{Session, SessionState};
use crate::stats::LockStats;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

/// Holds every lock of one session. Dropping the handle, or calling
/// [`ScopedHandle::release`], unlocks them in reverse key order.
///
/// The handle may move to another thread but is never shared, since it hands
/// out references into the guarded values.
pub struct ScopedHandle<'a, L: Lockable + ?Sized> {
    held: Vec<&'a L>,
    session: Session,
    stats: Arc<LockStats>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a, L: Lockable + ?Sized> ScopedHandle<'a, L> {
    /// `held` must be sorted by key and fully locked by `session`.
    pub(crate) fn new(held: Vec<&'a L>, session: Session, stats: Arc<LockStats>) -> Self {
        debug_assert_eq!(session.state(), SessionState::Held);
        ScopedHandle {
            held,
            session,
            stats,
            _not_sync: PhantomData,
        }
    }

    /// Unlocks everything, last acquired first. Returns `false` when the
    /// handle was already released.
    pub fn release(&mut self) -> bool {
        if self.session.state() != SessionState::Held {
            return false;
        }
        for j in (0..self.held.len()).rev() {
            self.session.advance(SessionState::Releasing(j));
            // SAFETY: held[j] was locked in Acquiring(j) by this session and
            // the Held check above guarantees it is still ours.
            unsafe { self.held[j].unlock() };
        }
        self.session.advance(SessionState::Idle);
        self.stats.record_released();
        true
    }

    pub fn is_released(&self) -> bool {
        self.session.state() != SessionState::Held
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Keys in the order they were locked.
    pub fn keys(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.held.iter().map(|resource| resource.identity_key())
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: ResourceKey) -> Option<usize> {
        self.held
            .binary_search_by_key(&key, |resource| resource.identity_key())
            .ok()
    }
}

impl<'a, T> ScopedHandle<'a, Resource<T>> {
    pub fn get(&self, key: ResourceKey) -> Option<&T> {
        if self.is_released() {
            return None;
        }
        let resource = self.held[self.position(key)?];
        // SAFETY: the session holds this resource's lock.
        Some(unsafe { &*resource.data_ptr() })
    }

    pub fn get_mut(&mut self, key: ResourceKey) -> Option<&mut T> {
        if self.is_released() {
            return None;
        }
        let resource = self.held[self.position(key)?];
        // SAFETY: the session holds this resource's lock and `&mut self`
        // rules out any other reference handed out by this handle.
        Some(unsafe { &mut *resource.data_ptr() })
    }

    /// Every guarded value with its key, in lock order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ResourceKey, &mut T)> + '_ {
        let live = !self.is_released();
        self.held
            .iter()
            .filter(move |_| live)
            // SAFETY: keys in a session are distinct, so every pointer here
            // belongs to a different resource whose lock the session holds.
            .map(|resource| (resource.key(), unsafe { &mut *resource.data_ptr() }))
    }

    pub fn values(&self) -> impl Iterator<Item = (ResourceKey, &T)> + '_ {
        let live = !self.is_released();
        self.held
            .iter()
            .filter(move |_| live)
            // SAFETY: the session holds every one of these locks.
            .map(|resource| (resource.key(), unsafe { &*resource.data_ptr() }))
    }
}

impl<L: Lockable + ?Sized> Drop for ScopedHandle<'_, L> {
    fn drop(&mut self) {
        self.release();
    }
}
