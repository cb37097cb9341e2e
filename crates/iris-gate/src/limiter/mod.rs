//! # Rate Limiter
//!
//! Fixed-window request counting against a shared [`CounterStore`].
//!
//! Every check increments the caller's counter in the store. The first hit
//! of a window starts a [`WINDOW`]-long expiry on the counter; once the count
//! passes the configured threshold the caller is denied until the counter
//! expires.
//!
//! ## Window boundaries
//!
//! Windows are fixed, not sliding. A client can spend its whole budget at
//! the end of one window and again at the start of the next, so up to twice
//! the threshold may be admitted across a boundary. This is the usual
//! trade-off of fixed-window counting.
//!
//! A counter past its first hit that has no expiry (because setting it
//! failed earlier) gets one set again, so a single failed `EXPIRE` cannot
//! leave a client denied forever.
//!
//! ## Store failures
//!
//! The limiter fails closed. With no store, or when a store call fails,
//! [`RateLimiter::check`] returns an error instead of a decision, and
//! callers must treat that as a refusal.

mod redis_store;
mod store;

#[cfg(test)]
/// In-memory store used by the limiter, pipeline and server tests.
pub(crate) mod mock_store;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use crate::error::LimiterError;
use crate::pipeline::ClientIdentity;

pub use redis_store::RedisStore;
pub use store::CounterStore;

/// Length of a counting window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Prefix of every counter key in the store
pub const KEY_PREFIX: &str = "rate_limit";

/// The outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request is within budget.
    Allow,
    /// The client has exceeded its budget for the current window.
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decides whether a client may proceed, using counters held in a shared store.
///
/// The store is optional: a limiter built without one is still valid and
/// reports [`LimiterError::Unavailable`] on every check.
#[derive(Clone)]
pub struct RateLimiter {
    /// The shared counter store, `None` when it could not be reached at startup
    store: Option<Arc<dyn CounterStore>>,

    /// Requests admitted per client per window
    max_requests: u64,
}

impl RateLimiter {
    /// Creates a limiter over `store`, or an unavailable limiter when `store` is `None`.
    pub fn new(store: Option<Arc<dyn CounterStore>>, max_requests: u64) -> Self {
        Self {
            store,
            max_requests,
        }
    }

    /// Creates a limiter that has no store and refuses every check.
    pub fn unavailable(max_requests: u64) -> Self {
        Self::new(None, max_requests)
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Store key of the counter for `identity`.
    pub fn key(identity: &ClientIdentity) -> String {
        format!("{}:{}", KEY_PREFIX, identity)
    }

    /// Counts one request for `identity` and decides whether it may proceed.
    ///
    /// The increment and the expiry are separate store calls. Concurrent
    /// first hits may both set the expiry, which is harmless. Later hits
    /// check that the counter still has an expiry and set it if not.
    ///
    /// # Errors
    ///
    /// * [`LimiterError::Unavailable`] if the limiter has no store
    /// * [`LimiterError::Store`] if a store call fails or times out
    pub async fn check(&self, identity: &ClientIdentity) -> Result<Decision, LimiterError> {
        let store = self.store.as_ref().ok_or(LimiterError::Unavailable)?;
        let key = Self::key(identity);

        let count = store.incr(&key).await.inspect_err(|e| {
            warn!(key = %key, error = %e, "rate limit increment failed");
        })?;

        let needs_window = count == 1
            || store
                .ttl(&key)
                .await
                .inspect_err(|e| warn!(key = %key, error = %e, "rate limit ttl lookup failed"))?
                .is_none();
        if needs_window {
            if count > 1 {
                warn!(key = %key, count, "rate limit counter had no expiry, restarting window");
            }
            store.expire(&key, WINDOW).await.inspect_err(|e| {
                warn!(key = %key, error = %e, "failed to start rate limit window");
            })?;
        }

        if count > self.max_requests {
            debug!(key = %key, count, limit = self.max_requests, "rate limit exceeded");
            Ok(Decision::Deny)
        } else {
            Ok(Decision::Allow)
        }
    }
}
