use std::future::Future;
use std::time::Duration;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::config::StoreConfig;
use crate::error::StoreError;
use super::store::CounterStore;

/// A [`CounterStore`] backed by Redis `INCR` and `EXPIRE`.
///
/// Wraps a multiplexed [`ConnectionManager`], which is cheap to clone and
/// reconnects on its own, so one store serves every request concurrently.
/// Every call is bounded by the configured timeout.
pub struct RedisStore {
    /// `None` once the store has been closed
    connection: RwLock<Option<ConnectionManager>>,

    /// Upper bound on any single round trip, including connecting
    timeout: Duration,
}

impl RedisStore {
    /// Connects to Redis and checks the connection with a single `PING`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the server cannot be
    /// reached, or it does not answer within the configured timeout.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut info = format!("redis://{}:{}/", config.host, config.port).into_connection_info()?;
        info.redis.password = config.password.clone();

        let client = redis::Client::open(info)?;
        let timeout = config.timeout;
        let manager = bounded(timeout, async move {
            let manager = ConnectionManager::new(client).await?;
            Ok::<_, StoreError>(manager)
        })
        .await?;

        let store = Self {
            connection: RwLock::new(Some(manager)),
            timeout,
        };
        store.ping().await?;
        info!(host = %config.host, port = config.port, "connected to rate limit store");
        Ok(store)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.connection.read().await.clone().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        bounded(self.timeout, async move {
            let count: u64 = conn.incr(key, 1u64).await?;
            Ok::<_, StoreError>(count)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs() as i64;
        bounded(self.timeout, async move {
            let _: bool = conn.expire(key, seconds).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection().await?;
        bounded(self.timeout, async move {
            // -1 means no expiry, -2 means no key
            let seconds: i64 = conn.ttl(key).await?;
            Ok::<_, StoreError>(u64::try_from(seconds).ok().map(Duration::from_secs))
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        bounded(self.timeout, async move {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            debug!(reply = %pong, "rate limit store answered ping");
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn close(&self) {
        if self.connection.write().await.take().is_some() {
            info!("closed rate limit store connection");
        }
    }
}

async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
