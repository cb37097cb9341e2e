//! Service configuration, read from environment variables.
//!
//! | Variable                | Default                   |
//! |-------------------------|---------------------------|
//! | `REDIS_HOST`            | `localhost`               |
//! | `REDIS_PORT`            | `6379`                    |
//! | `REDIS_PASSWORD`        | none                      |
//! | `RATE_LIMIT_PER_MINUTE` | `10`                      |
//! | `MODEL_PATH`            | `models/iris.safetensors` |
//! | `BIND_ADDRESS`          | `0.0.0.0:8000`            |
//! | `STORE_TIMEOUT_MS`      | `500`                     |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use serde::Deserialize;
use crate::error::ServerError;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host of the rate limit store
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    /// Requests admitted per client per one-minute window
    pub rate_limit_per_minute: u64,
    /// Path of the safetensors model artifact
    pub model_path: PathBuf,
    /// Socket address the HTTP listener binds to
    pub bind_address: String,
    /// Upper bound on any single rate limit store call, in milliseconds
    pub store_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: None,
            rate_limit_per_minute: 10,
            model_path: PathBuf::from("models/iris.safetensors"),
            bind_address: "0.0.0.0:8000".to_string(),
            store_timeout_ms: 500,
        }
    }
}

/// Connection settings for the rate limit store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ServerError> {
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit set of variables instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ServerError> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(environment: config::Environment) -> Result<Self, ServerError> {
        let config: Config = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.rate_limit_per_minute == 0 {
            return Err(ServerError::Config(
                "RATE_LIMIT_PER_MINUTE must be at least 1".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ServerError::Config(
                "STORE_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: self.redis_password.clone(),
            timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}
