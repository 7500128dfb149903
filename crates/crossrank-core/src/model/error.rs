use std::path::PathBuf;
use thiserror::Error;

/// Failures from a [`ModelLoader`](super::ModelLoader) or a
/// [`CrossEncoder`](super::CrossEncoder). `Clone` so a failed load can be
/// reported to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// A required model file or directory is missing.
    #[error("cross-encoder file missing: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("could not load cross-encoder: {reason}")]
    LoadFailed { reason: String },

    #[error("cross-encoder forward pass failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize query/document pairs: {reason}")]
    TokenizationFailed { reason: String },
}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::LoadFailed {
            reason: err.to_string(),
        }
    }
}
