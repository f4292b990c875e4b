//! Per-call acquisition state machine.
//!
//! ```text
//! Idle -> Acquiring(0) -> .. -> Acquiring(n-1) -> Held
//!      -> Releasing(n-1) -> .. -> Releasing(0) -> Idle
//! Acquiring(i) -> Aborted   (after releasing 0..i)
//! ```

use crate::key::ResourceKey;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    /// Waiting on the i-th resource in key order.
    Acquiring(usize),
    Held,
    /// Unlocking the j-th resource in key order.
    Releasing(usize),
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Aborted)
    }

    fn can_move_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Acquiring(0)) => true,
            (Acquiring(i), Acquiring(j)) => j == i + 1,
            (Acquiring(_), Held) | (Acquiring(_), Aborted) => true,
            (Held, Releasing(_)) => true,
            (Releasing(i), Releasing(j)) => j + 1 == i,
            (Releasing(0), Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Acquiring(i) => write!(f, "acquiring[{}]", i),
            SessionState::Held => write!(f, "held"),
            SessionState::Releasing(j) => write!(f, "releasing[{}]", j),
            SessionState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Runtime record of one acquire/release cycle.
#[derive(Debug, Clone)]
pub struct Session {
    id: u64,
    order: Vec<ResourceKey>,
    state: SessionState,
    history: Vec<SessionState>,
    logged: bool,
}

impl Session {
    pub(crate) fn new(id: u64, order: Vec<ResourceKey>, logged: bool) -> Self {
        Session {
            id,
            order,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
            logged,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Keys in acquisition order.
    pub fn order(&self) -> &[ResourceKey] {
        &self.order
    }

    /// Every state the session went through, oldest first.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        if self.logged {
            let key = match next {
                SessionState::Acquiring(i) | SessionState::Releasing(i) => self.order.get(i).copied(),
                _ => None,
            };
            match key {
                Some(key) => debug!(session = self.id, from = %self.state, to = %next, key = %key, "session transition"),
                None => debug!(session = self.id, from = %self.state, to = %next, "session transition"),
            }
        }
        self.state = next;
        self.history.push(next);
    }
}
