use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use crate::error::StoreError;
use super::store::CounterStore;

// An in-memory counter store on the tokio clock, so paused-time tests can expire windows
#[derive(Default)]
pub struct MockStore {
    counters: Mutex<HashMap<String, (u64, Option<Instant>)>>,
    failing: AtomicBool,
    failing_expires: AtomicUsize,
    closed: AtomicBool,
    expire_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail, as if the network dropped.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `times` calls to `expire` fail.
    pub fn fail_expire(&self, times: usize) {
        self.failing_expires.store(times, Ordering::SeqCst);
    }

    pub fn count(&self, key: &str) -> u64 {
        self.live(key).map(|(count, _)| count).unwrap_or(0)
    }

    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        self.live(key)
            .and_then(|(_, expiry)| expiry)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn live(&self, key: &str) -> Option<(u64, Option<Instant>)> {
        let counters = self.counters.lock().unwrap();
        counters
            .get(key)
            .copied()
            .filter(|(_, expiry)| !expiry.is_some_and(|at| at <= Instant::now()))
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MockStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        self.check()?;
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((0, None));
        if entry.1.is_some_and(|at| at <= now) {
            *entry = (0, None);
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failing_expires.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_expires.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        let mut counters = self.counters.lock().unwrap();
        if let Some(entry) = counters.get_mut(key) {
            entry.1 = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.check()?;
        Ok(self.expires_in(key))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
