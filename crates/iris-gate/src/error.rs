//! Error types for the inference service.
//!
//! Startup and serving failures ([`ServerError`]) are fatal to the process.
//! Everything that can go wrong while answering one request ends up as an
//! [`ApiError`], which is the only error type turned into an HTTP response.

use std::path::PathBuf;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

// fatal process-level errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model load error: {0}")]
    ModelLoad(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

// errors reading a model artifact
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode model artifact {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    #[error("model artifact has no `{0}` tensor")]
    MissingTensor(&'static str),

    #[error("tensor `{name}` has shape {actual:?}, expected {expected:?}")]
    Shape {
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("tensor `{0}` contains non-finite values")]
    NonFinite(&'static str),

    #[error("standardization scale must be positive and finite")]
    InvalidScale,

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

// errors talking to the counter store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("store connection closed")]
    Closed,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store backend error: {0}")]
    Backend(String),
}

// reasons the limiter could not reach a decision
#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("rate limit store was never connected")]
    Unavailable,

    #[error("rate limit store call failed: {0}")]
    Store(#[from] StoreError),
}

// per-request outcomes other than a prediction
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded: {limit} requests per minute")]
    RateLimited { limit: u64 },

    #[error("Rate limiter unavailable")]
    LimiterUnavailable,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::LimiterUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LimiterError> for ApiError {
    fn from(_: LimiterError) -> Self {
        ApiError::LimiterUnavailable
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
