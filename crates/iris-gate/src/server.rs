//! HTTP surface of the service.
//!
//! - `GET /` returns a fixed welcome message.
//! - `POST /predict` runs the request [`Pipeline`] on a JSON [`FeatureVector`].

use std::convert::Infallible;
use std::net::SocketAddr;
use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use crate::error::ApiError;
use crate::model::FeatureVector;
use crate::pipeline::{ClientIdentity, Pipeline, PredictionResult};

/// Message returned by `GET /`
pub const WELCOME_MESSAGE: &str = "Welcome to the Iris Classification API";

#[derive(Debug, Serialize)]
struct Welcome {
    message: &'static str,
}

/// Builds the service router around a shared pipeline.
///
/// Client identity comes from the peer address, which is only present when
/// the router is served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(pipeline: Pipeline) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/predict", post(predict))
        .with_state(pipeline)
}

async fn welcome() -> Json<Welcome> {
    Json(Welcome {
        message: WELCOME_MESSAGE,
    })
}

// The body is taken as a `Result` so a bad payload does not short-circuit
// the rate-limit check that has to run first.
async fn predict(
    State(pipeline): State<Pipeline>,
    identity: ClientIdentity,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let payload = payload
        .map(|Json(features)| features)
        .map_err(|rejection| rejection.body_text());
    pipeline.predict(&identity, payload).await.map(Json)
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIdentity::from_peer(peer))
    }
}
