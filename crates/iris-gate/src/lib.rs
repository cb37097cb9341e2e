//! # Iris Gate
//!
//! A rate-limited HTTP inference service. It takes four flower measurements,
//! runs a pre-trained classifier over them, and answers with one of three
//! iris species. A shared, Redis-backed fixed-window limiter protects the
//! model from abusive call volume.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - [`model`]: the read-only [`model::Classifier`] loaded once at startup
//! - [`limiter`]: fixed-window counting against a shared [`limiter::CounterStore`]
//! - [`pipeline`]: per request, limiter check, then payload validation, then model
//! - [`server`]: the axum router mapping the pipeline onto HTTP
//! - [`lifecycle`]: startup, serving and shutdown ordering
//!
//! ## Failure policy
//!
//! A model that cannot be loaded aborts startup. A store that cannot be
//! reached does not: the service starts, and the limiter fails closed,
//! refusing every prediction with a 500 until the store is back. The limiter
//! never lets traffic through unmetered.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod limiter;
pub mod model;
pub mod pipeline;
pub mod server;

pub use crate::config::Config;
pub use error::{ApiError, ServerError};
pub use lifecycle::{shutdown_signal, Service};
