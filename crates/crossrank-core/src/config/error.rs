use std::path::PathBuf;
use thiserror::Error;

/// Rejected `RERANKER_*` settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `RERANKER_PORT` parsed but is zero.
    #[error("RERANKER_PORT={value} is not a usable port (1-65535)")]
    InvalidPort { value: String },

    #[error("RERANKER_PORT={value} is not a number: {source}")]
    MalformedPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("RERANKER_HOST={value} is not an IP address: {source}")]
    InvalidHost {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{name} must be greater than zero")]
    MustBePositive { name: &'static str },

    #[error("model directory {path} does not exist")]
    ModelPathMissing { path: PathBuf },

    /// The model path must hold `config.json`, weights and tokenizer, so a file is rejected.
    #[error("model path {path} is not a directory")]
    ModelPathNotDirectory { path: PathBuf },
}
