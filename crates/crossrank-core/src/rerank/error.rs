use std::time::Duration;
use thiserror::Error;

use crate::scoring::ScoringError;

/// Errors surfaced by [`RerankService`](super::RerankService).
///
/// `Clone` because a single failed computation is delivered to every caller
/// waiting on the same fingerprint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RerankError {
    /// Empty or malformed request. Never retried.
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    /// Scoring (or waiting for it) exceeded the deadline.
    #[error("rerank timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// Model is not loaded or failed to load; retry later.
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// Scoring workers and queue are saturated; retry with backoff.
    #[error("scoring capacity exhausted ({queued} queued, limit {limit})")]
    Backpressure { queued: usize, limit: usize },

    /// Unexpected failure in scoring or ranking.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl RerankError {
    pub fn validation(reason: impl Into<String>) -> Self {
        RerankError::Validation {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        RerankError::Internal {
            reason: reason.into(),
        }
    }

    /// Stable label used in metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RerankError::Validation { .. } => "validation",
            RerankError::Timeout { .. } => "timeout",
            RerankError::ModelUnavailable { .. } => "model_unavailable",
            RerankError::Backpressure { .. } => "backpressure",
            RerankError::Internal { .. } => "internal",
        }
    }

    /// `true` for failures a caller may reasonably retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RerankError::Timeout { .. }
                | RerankError::ModelUnavailable { .. }
                | RerankError::Backpressure { .. }
        )
    }
}

impl From<ScoringError> for RerankError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Timeout { after } => RerankError::Timeout { after },
            ScoringError::ModelUnavailable { reason } => RerankError::ModelUnavailable { reason },
            ScoringError::Backpressure { queued, limit } => {
                RerankError::Backpressure { queued, limit }
            }
            ScoringError::Internal { reason } => RerankError::Internal { reason },
        }
    }
}
