//! Deadlock-free acquisition of several locks at once.
//!
//! Every lockable resource carries an immutable [`ResourceKey`]. The
//! [`OrderedLocker`] sorts each request by key and locks in that order, so two
//! threads asking for `{A, B}` and `{B, A}` both take `A` first and can never
//! wait on each other in a cycle. Release happens in reverse order when the
//! returned [`ScopedHandle`] is released or dropped.
//!
//! ```
//! use lock_ordering::{acquire_all, Resource};
//!
//! let checking = Resource::new(100);
//! let savings = Resource::new(0);
//!
//! let mut handle = acquire_all(&[&savings, &checking]).unwrap();
//! *handle.get_mut(checking.key()).unwrap() -= 40;
//! *handle.get_mut(savings.key()).unwrap() += 40;
//! drop(handle);
//!
//! assert_eq!(*savings.lock().unwrap(), 40);
//! ```

pub mod config;
pub mod counter;
pub mod error;
pub mod handle;
pub mod key;
pub mod lockable;
pub mod locker;
pub mod resource;
pub mod session;
pub mod stats;
pub mod telemetry;
pub mod wait;

pub use config::{ConfigError, LockerConfig};
pub use counter::Counter;
pub use error::{CancelReason, InvalidRequest, LockError};
pub use handle::ScopedHandle;
pub use key::{KeyAllocator, ResourceKey};
pub use lockable::Lockable;
pub use locker::{acquire_all, global_locker, OrderedLocker};
pub use resource::{Resource, ResourceGuard};
pub use session::{Session, SessionState};
pub use stats::{LockStats, StatsSnapshot};
pub use wait::{AcquireOptions, CancelToken, WaitPolicy};
