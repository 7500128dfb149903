use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crossrank::{CROSSRANK_CACHE_HEADER, RerankRequest};

use crate::gateway::error::GatewayError;
use crate::gateway::payload::RerankResponse;
use crate::gateway::state::HandlerState;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[instrument(
    skip(state, payload),
    fields(request_id = tracing::field::Empty, documents = tracing::field::Empty)
)]
pub async fn rerank_handler(
    State(state): State<HandlerState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let request_id = Uuid::new_v4();
    tracing::Span::current().record("request_id", tracing::field::display(&request_id));

    let request = match parse_request(payload) {
        Ok(request) => request,
        Err(e) => {
            state.service.record_rejected();
            return Err(e);
        }
    };
    tracing::Span::current().record("documents", request.documents.len());

    debug!(
        query_len = request.query.len(),
        top_k = ?request.top_k,
        "Rerank request received"
    );

    let outcome = state.service.rerank(request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CROSSRANK_CACHE_HEADER,
        HeaderValue::from_static(outcome.status.as_header_value()),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    Ok((
        StatusCode::OK,
        headers,
        Json(RerankResponse::from(outcome.result.as_ref())),
    )
        .into_response())
}

fn parse_request(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<RerankRequest, GatewayError> {
    let Json(payload) = payload
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed body: {}", e.body_text())))?;
    serde_json::from_value(payload)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid request schema: {e}")))
}
