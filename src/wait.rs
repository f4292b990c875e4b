//! Timeouts and cancellation for blocked acquisitions.

use crate::error::CancelReason;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Shared cancellation flag. Clones observe the same flag.
///
/// A waiter notices cancellation within one poll interval of [`CancelToken::cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Caller-facing knobs for one `acquire_all_with` call.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// How long a blocked `lock` may wait, fixed when the session starts.
///
/// The deadline covers the whole session, so a set of N resources shares a
/// single timeout budget.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    started: Instant,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
    poll_interval: Duration,
}

impl WaitPolicy {
    /// Block until the lock is free, however long that takes.
    pub fn forever() -> Self {
        WaitPolicy {
            started: Instant::now(),
            deadline: None,
            cancel: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Give up once `timeout` has passed. A timeout too large to be
    /// represented as an `Instant` waits forever.
    pub fn timeout(timeout: Duration) -> Self {
        let started = Instant::now();
        WaitPolicy {
            started,
            deadline: started.checked_add(timeout),
            cancel: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_options(options: &AcquireOptions, poll_interval: Duration) -> Self {
        let base = match options.timeout {
            Some(timeout) => WaitPolicy::timeout(timeout),
            None => WaitPolicy::forever(),
        };
        WaitPolicy {
            cancel: options.cancel.clone(),
            poll_interval,
            ..base
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.deadline.is_none() && self.cancel.is_none()
    }

    /// Returns the reason to stop waiting, if there is one. Cancellation wins
    /// over an expired deadline.
    pub fn interrupted(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(CancelReason::Signalled);
        }
        let now = Instant::now();
        match self.deadline {
            Some(deadline) if now >= deadline => Some(CancelReason::TimedOut {
                waited: now.duration_since(self.started),
            }),
            _ => None,
        }
    }

    /// Length of the next timed wait, or `None` for an untimed wait.
    pub fn next_slice(&self) -> Option<Duration> {
        let remaining = self
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        match (remaining, self.cancel.is_some()) {
            (None, false) => None,
            (None, true) => Some(self.poll_interval),
            (Some(remaining), false) => Some(remaining),
            (Some(remaining), true) => Some(remaining.min(self.poll_interval)),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::forever()
    }
}
