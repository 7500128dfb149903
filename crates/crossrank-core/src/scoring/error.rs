use std::time::Duration;
use thiserror::Error;

/// Failures of a single scoring gateway call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    /// Queue wait plus inference exceeded the deadline.
    #[error("scoring timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// Model is not loaded or could not be loaded.
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// All workers busy and the wait queue is full.
    #[error("scoring queue full ({queued} queued, limit {limit})")]
    Backpressure { queued: usize, limit: usize },

    /// Inference failed or returned malformed output.
    #[error("scoring failed: {reason}")]
    Internal { reason: String },
}

impl ScoringError {
    pub fn internal(reason: impl Into<String>) -> Self {
        ScoringError::Internal {
            reason: reason.into(),
        }
    }

    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Timeout { .. } => "timeout",
            ScoringError::ModelUnavailable { .. } => "model_unavailable",
            ScoringError::Backpressure { .. } => "backpressure",
            ScoringError::Internal { .. } => "internal",
        }
    }
}
