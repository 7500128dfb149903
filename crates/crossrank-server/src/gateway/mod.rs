//! HTTP gateway (Axum) in front of [`RerankService`](crossrank::RerankService).
//!
//! Routes:
//! - `POST /rerank` - rank documents against a query
//! - `GET /health` - liveness, never loads the model
//! - `GET /ready` - model readiness (503 only while a preload is pending)
//! - `GET /metrics` - JSON counters and process usage
//! - `GET /metrics/prometheus` - Prometheus text exposition

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;

#[cfg(test)]
mod handler_tests;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::instrument;

pub use error::GatewayError;
pub use handler::rerank_handler;
pub use state::HandlerState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/rerank", post(rerank_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prometheus", get(prometheus_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(skip(state))]
pub async fn health_handler(State(state): State<HandlerState>) -> Response {
    (StatusCode::OK, Json(state.health().live())).into_response()
}

#[instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let report = state.health().ready();
    let status = if report.is_blocking() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(report)).into_response()
}

#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<HandlerState>) -> Response {
    (StatusCode::OK, Json(state.service.metrics_snapshot())).into_response()
}

#[instrument(skip(state))]
pub async fn prometheus_handler(State(state): State<HandlerState>) -> Result<Response, GatewayError> {
    let body = state
        .service
        .prometheus_text()
        .map_err(|e| GatewayError::InternalError(format!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        body,
    )
        .into_response())
}
