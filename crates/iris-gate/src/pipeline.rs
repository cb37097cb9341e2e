//! # Request Pipeline
//!
//! Per-request orchestration: rate-limit check, payload validation, model
//! invocation, in that order. The counter is incremented before the payload
//! is looked at, so a malformed request still spends one unit of the
//! client's budget and malformed payloads cannot be used to get around the
//! limit.

use std::fmt::{self, Display};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use crate::error::{ApiError, LimiterError};
use crate::limiter::{Decision, RateLimiter};
use crate::model::{Classifier, FeatureVector, Label};

/// The key a client's requests are counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    /// The peer's IP address; the port is not part of the identity
    Address(IpAddr),
    /// Peer address unavailable. All such clients share one budget.
    Unknown,
}

impl ClientIdentity {
    pub fn from_peer(peer: Option<SocketAddr>) -> Self {
        match peer {
            Some(addr) => ClientIdentity::Address(addr.ip()),
            None => ClientIdentity::Unknown,
        }
    }
}

impl Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::Address(ip) => write!(f, "{}", ip),
            ClientIdentity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Body of a successful `POST /predict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionResult {
    pub predicted_class: Label,
}

/// Runs one prediction request from rate-limit check to response value.
///
/// Cheap to clone; clones share the model and the limiter's store.
#[derive(Clone)]
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    limiter: RateLimiter,
}

impl Pipeline {
    pub fn new(classifier: Arc<dyn Classifier>, limiter: RateLimiter) -> Self {
        Self {
            classifier,
            limiter,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Handles one prediction request.
    ///
    /// # Parameters
    ///
    /// * `identity` - Who the request is counted against
    /// * `payload` - The decoded request body, or the decoder's complaint
    ///
    /// # Returns
    ///
    /// The predicted label, or the [`ApiError`] the request is answered with.
    /// The model is only invoked for an allowed request with a valid payload.
    pub async fn predict(
        &self,
        identity: &ClientIdentity,
        payload: Result<FeatureVector, String>,
    ) -> Result<PredictionResult, ApiError> {
        let span = info_span!("predict", request_id = %Uuid::new_v4(), client = %identity);

        async move {
            match self.limiter.check(identity).await {
                Ok(Decision::Allow) => {}
                Ok(Decision::Deny) => {
                    return Err(ApiError::RateLimited {
                        limit: self.limiter.max_requests(),
                    });
                }
                // never connected: already reported once at startup
                Err(LimiterError::Unavailable) => {
                    debug!("rate limiter unavailable, refusing request");
                    return Err(ApiError::LimiterUnavailable);
                }
                Err(e) => {
                    warn!(error = %e, "rate limit store call failed, refusing request");
                    return Err(ApiError::LimiterUnavailable);
                }
            }

            let features = payload.map_err(|detail| {
                debug!(detail = %detail, "rejected malformed payload");
                ApiError::Validation(detail)
            })?;

            let predicted_class = Label::from_index(self.classifier.predict(&features));
            info!(predicted_class = %predicted_class, "served prediction");
            Ok(PredictionResult { predicted_class })
        }
        .instrument(span)
        .await
    }
}
