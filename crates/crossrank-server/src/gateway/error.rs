use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crossrank::RerankError;

use super::payload::ErrorResponse;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body is not JSON or does not match the request schema.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Rerank(err) => match err {
                RerankError::Validation { .. } => StatusCode::BAD_REQUEST,
                RerankError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                RerankError::ModelUnavailable { .. } | RerankError::Backpressure { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                RerankError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "validation",
            GatewayError::Rerank(err) => err.kind(),
            GatewayError::InternalError(_) => "internal",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, kind = self.kind(), "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
            kind: self.kind().to_string(),
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
