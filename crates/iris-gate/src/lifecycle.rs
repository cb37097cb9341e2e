//! # Process Lifecycle
//!
//! Owns everything a request needs and orders it around serving:
//!
//! 1. [`Service::start`] loads the model (fatal on failure) and then tries the
//!    rate limit store (non-fatal; the limiter is left unavailable)
//! 2. [`Service::serve`] accepts connections until the shutdown future
//!    resolves and in-flight requests have finished
//! 3. the store connection is closed and the model dropped
//!
//! Nothing is served before step 1 completes or after step 3 begins.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use crate::config::Config;
use crate::error::ServerError;
use crate::limiter::{CounterStore, RateLimiter, RedisStore};
use crate::model::{Classifier, LogisticModel};
use crate::pipeline::Pipeline;
use crate::server::router;

/// The started service: a loaded model and, if it could be reached, a store connection.
pub struct Service {
    pipeline: Pipeline,

    /// Kept here as well as in the limiter so it can be closed after serving
    store: Option<Arc<dyn CounterStore>>,
}

impl Service {
    /// Starts the service from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ModelLoad`] if the model artifact is missing or
    /// undecodable. An unreachable store is not an error: it is logged and
    /// every prediction is refused until the process is restarted with the
    /// store reachable.
    pub async fn start(config: &Config) -> Result<Self, ServerError> {
        let model = LogisticModel::load(&config.model_path)?;

        let store = match RedisStore::connect(&config.store()).await {
            Ok(store) => Some(Arc::new(store) as Arc<dyn CounterStore>),
            Err(e) => {
                warn!(
                    error = %e,
                    host = %config.redis_host,
                    port = config.redis_port,
                    "rate limit store unavailable, predictions will be refused"
                );
                None
            }
        };

        Ok(Self::new(Arc::new(model), store, config.rate_limit_per_minute))
    }

    /// Assembles a service from already acquired parts.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Option<Arc<dyn CounterStore>>,
        max_requests: u64,
    ) -> Self {
        let limiter = RateLimiter::new(store.clone(), max_requests);
        Self {
            pipeline: Pipeline::new(classifier, limiter),
            store,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn limiter_available(&self) -> bool {
        self.store.is_some()
    }

    /// Serves HTTP on `listener` until `shutdown` resolves, then releases resources.
    ///
    /// In-flight requests are allowed to finish before the store is closed.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.pipeline.clone());
        info!(
            address = %listener.local_addr()?,
            limiter_available = self.limiter_available(),
            "serving predictions"
        );

        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await;

        self.shutdown().await;
        Ok(served?)
    }

    /// Closes the store connection and drops the model.
    pub async fn shutdown(self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
        info!("service shut down");
    }
}

/// Resolves when the process is asked to stop: Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
