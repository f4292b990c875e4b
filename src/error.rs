//! Error types for ordered lock acquisition.

use crate::key::ResourceKey;
use std::time::Duration;
use thiserror::Error;

/// Why a lock set request was rejected before any lock was taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("a lock set needs at least 2 resources, got {count}")]
    TooFewResources { count: usize },

    #[error("resource {key} appears more than once in the request")]
    DuplicateKey { key: ResourceKey },
}

/// Why a blocked wait was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("timed out after {waited:?}")]
    TimedOut { waited: Duration },

    #[error("cancelled by caller")]
    Signalled,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("invalid lock request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    /// The resource was destroyed while (or before) the caller waited on it.
    #[error("resource {key} is no longer available")]
    ResourceUnavailable { key: ResourceKey },

    #[error("acquisition of resource {key} cancelled: {reason}")]
    Cancelled { key: ResourceKey, reason: CancelReason },
}

impl LockError {
    pub fn too_few(count: usize) -> Self {
        LockError::InvalidRequest(InvalidRequest::TooFewResources { count })
    }

    pub fn duplicate(key: ResourceKey) -> Self {
        LockError::InvalidRequest(InvalidRequest::DuplicateKey { key })
    }

    /// Key of the resource the failure happened on, if any.
    pub fn key(&self) -> Option<ResourceKey> {
        match self {
            LockError::InvalidRequest(InvalidRequest::DuplicateKey { key }) => Some(*key),
            LockError::InvalidRequest(InvalidRequest::TooFewResources { .. }) => None,
            LockError::ResourceUnavailable { key } | LockError::Cancelled { key, .. } => Some(*key),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LockError::Cancelled {
                reason: CancelReason::TimedOut { .. },
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_display() {
        let err = LockError::too_few(1);
        let display = err.to_string();
        assert!(display.contains("at least 2"));
        assert!(display.contains("got 1"));
    }

    #[test]
    fn test_duplicate_display_names_key() {
        let err = LockError::duplicate(ResourceKey::new(42));
        assert!(err.to_string().contains("#42"));
        assert_eq!(err.key(), Some(ResourceKey::new(42)));
    }

    #[test]
    fn test_cancelled_display() {
        let err = LockError::Cancelled {
            key: ResourceKey::new(3),
            reason: CancelReason::TimedOut {
                waited: Duration::from_millis(250),
            },
        };
        let display = err.to_string();
        assert!(display.contains("#3"));
        assert!(display.contains("timed out"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_signalled_is_not_timeout() {
        let err = LockError::Cancelled {
            key: ResourceKey::new(3),
            reason: CancelReason::Signalled,
        };
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<LockError>();
        assert_sync::<LockError>();
    }
}
