use std::time::Duration;
use async_trait::async_trait;
use crate::error::StoreError;

/// A shared key/counter service the rate limiter keeps its windows in.
///
/// The store owns every counter; callers never cache values between calls.
/// Implementations must make [`CounterStore::incr`] atomic across concurrent
/// callers, including callers in other processes.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically increments the counter at `key`, creating it at zero first
    /// if it does not exist.
    ///
    /// # Returns
    ///
    /// The value after the increment
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Sets `key` to expire after `ttl`. Setting it again is harmless.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Returns how long `key` has left to live, or `None` if it has no
    /// expiry or does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Round-trips a no-op to check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases the connection; later calls fail with [`StoreError::Closed`].
    async fn close(&self);
}
