//! A shared counter that follows the same lock discipline as any other
//! resource, so it can also be locked together with other resources.

use crate::error::LockError;
use crate::key::ResourceKey;
use crate::resource::Resource;

#[derive(Debug, Default)]
pub struct Counter {
    count: Resource<i64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(value: i64) -> Self {
        Counter {
            count: Resource::new(value),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.count.key()
    }

    /// Adds one and returns the new value.
    pub fn increment(&self) -> Result<i64, LockError> {
        self.add(1)
    }

    pub fn add(&self, delta: i64) -> Result<i64, LockError> {
        let mut count = self.count.lock()?;
        *count += delta;
        Ok(*count)
    }

    pub fn value(&self) -> Result<i64, LockError> {
        Ok(*self.count.lock()?)
    }

    /// The underlying resource, for ordered multi-resource updates.
    pub fn resource(&self) -> &Resource<i64> {
        &self.count
    }
}
