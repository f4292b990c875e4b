//! Ordered multi-lock acquisition.
//!
//! Every request is sorted by identity key before any lock is taken, so two
//! callers asking for overlapping sets always contend on the lowest shared key
//! first and can never hold each other's next lock.

use crate::config::LockerConfig;
use crate::error::LockError;
use crate::handle::ScopedHandle;
use crate::lockable::Lockable;
use crate::session::{Session, SessionState};
use crate::stats::{LockStats, StatsSnapshot};
use crate::wait::{AcquireOptions, WaitPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct OrderedLocker {
    config: LockerConfig,
    stats: Arc<LockStats>,
    next_session: AtomicU64,
}

impl Default for OrderedLocker {
    fn default() -> Self {
        Self::new(LockerConfig::default())
    }
}

impl OrderedLocker {
    pub fn new(config: LockerConfig) -> Self {
        OrderedLocker {
            config,
            stats: Arc::new(LockStats::new()),
            next_session: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Locks every resource in ascending key order, blocking as long as it
    /// takes unless the config sets a default timeout.
    pub fn acquire_all<'a, L: Lockable + ?Sized>(
        &self,
        resources: &[&'a L],
    ) -> Result<ScopedHandle<'a, L>, LockError> {
        self.acquire_all_with(resources, &AcquireOptions::default())
    }

    /// Like [`OrderedLocker::acquire_all`], giving up on timeout or
    /// cancellation. Anything already locked is released before the error is
    /// returned.
    pub fn acquire_all_with<'a, L: Lockable + ?Sized>(
        &self,
        resources: &[&'a L],
        options: &AcquireOptions,
    ) -> Result<ScopedHandle<'a, L>, LockError> {
        let order = self.sorted(resources)?;
        let wait = self.wait_policy(options);
        let mut session = self.open(&order);

        for (i, resource) in order.iter().enumerate() {
            session.advance(SessionState::Acquiring(i));
            if let Err(err) = Lockable::lock(*resource, &wait) {
                self.abort(&mut session, &order[..i], &err);
                return Err(err);
            }
        }

        session.advance(SessionState::Held);
        self.stats.record_acquired();
        Ok(ScopedHandle::new(order, session, Arc::clone(&self.stats)))
    }

    /// Non-blocking variant. Returns `Ok(None)` as soon as one lock is busy,
    /// after releasing whatever this call had taken.
    pub fn try_acquire_all<'a, L: Lockable + ?Sized>(
        &self,
        resources: &[&'a L],
    ) -> Result<Option<ScopedHandle<'a, L>>, LockError> {
        let order = self.sorted(resources)?;
        let mut session = self.open(&order);

        for (i, resource) in order.iter().enumerate() {
            session.advance(SessionState::Acquiring(i));
            match Lockable::try_lock(*resource) {
                Ok(true) => {}
                Ok(false) => {
                    unwind(&order[..i]);
                    session.advance(SessionState::Aborted);
                    self.stats.record_would_block();
                    debug!(session = session.id(), key = %resource.identity_key(), "lock busy, backing off");
                    return Ok(None);
                }
                Err(err) => {
                    self.abort(&mut session, &order[..i], &err);
                    return Err(err);
                }
            }
        }

        session.advance(SessionState::Held);
        self.stats.record_acquired();
        Ok(Some(ScopedHandle::new(order, session, Arc::clone(&self.stats))))
    }

    fn sorted<'a, L: Lockable + ?Sized>(&self, resources: &[&'a L]) -> Result<Vec<&'a L>, LockError> {
        if resources.len() < 2 {
            self.stats.record_rejected();
            return Err(LockError::too_few(resources.len()));
        }

        let mut order = resources.to_vec();
        order.sort_by_key(|resource| resource.identity_key());

        if let Some(pair) = order
            .windows(2)
            .find(|pair| pair[0].identity_key() == pair[1].identity_key())
        {
            self.stats.record_rejected();
            return Err(LockError::duplicate(pair[0].identity_key()));
        }
        Ok(order)
    }

    fn wait_policy(&self, options: &AcquireOptions) -> WaitPolicy {
        let mut options = options.clone();
        if options.timeout.is_none() {
            options.timeout = self.config.default_timeout();
        }
        WaitPolicy::from_options(&options, self.config.poll_interval())
    }

    fn open<L: Lockable + ?Sized>(&self, order: &[&L]) -> Session {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let keys = order.iter().map(|resource| resource.identity_key()).collect();
        Session::new(id, keys, self.config.log_sessions)
    }

    fn abort<L: Lockable + ?Sized>(&self, session: &mut Session, held: &[&L], err: &LockError) {
        unwind(held);
        session.advance(SessionState::Aborted);
        match err {
            LockError::Cancelled { .. } => self.stats.record_cancelled(),
            LockError::ResourceUnavailable { .. } => self.stats.record_unavailable(),
            // Counted by `sorted`; never reaches here.
            LockError::InvalidRequest(_) => {}
        }
        warn!(session = session.id(), released = held.len(), error = %err, "acquisition aborted");
    }
}

/// Unlocks a partially acquired prefix, highest key first.
fn unwind<L: Lockable + ?Sized>(held: &[&L]) {
    for resource in held.iter().rev() {
        // SAFETY: callers pass exactly the prefix this session locked.
        unsafe { resource.unlock() };
    }
}

/// Process-wide locker with the default configuration.
pub fn global_locker() -> &'static OrderedLocker {
    static GLOBAL: OnceLock<OrderedLocker> = OnceLock::new();
    GLOBAL.get_or_init(OrderedLocker::default)
}

/// Shorthand for `global_locker().acquire_all(resources)`.
pub fn acquire_all<'a, L: Lockable + ?Sized>(
    resources: &[&'a L],
) -> Result<ScopedHandle<'a, L>, LockError> {
    global_locker().acquire_all(resources)
}
