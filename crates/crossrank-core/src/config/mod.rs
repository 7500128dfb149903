//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `RERANKER_*` environment variables.
//! The loaded [`Config`] is immutable for the lifetime of the process.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default cross-encoder identifier reported by `/ready`.
pub const DEFAULT_MODEL_NAME: &str = "cross-encoder/ms-marco-MiniLM-L-12-v2";

/// Default maximum token length for a (query, document) pair.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Default number of cached rerank results.
pub const DEFAULT_CACHE_SIZE: usize = 128;

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 900;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 30.0;

/// Default number of callers allowed to wait for a scoring worker.
pub const DEFAULT_MAX_QUEUE: usize = 64;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `10000`.
    pub port: u16,

    /// IP address to bind to. Default: `0.0.0.0`.
    pub bind_addr: IpAddr,

    /// Model identifier (informational; reported by readiness probes).
    pub model_name: String,

    /// Local model directory (`config.json`, `model.safetensors`, `tokenizer.json`).
    ///
    /// When unset the lexical stub backend is used.
    pub model_path: Option<PathBuf>,

    /// Maximum token length for each (query, document) pair.
    pub max_length: usize,

    /// Max entries in the result cache.
    pub cache_size: usize,

    /// Lifetime of a cached result, measured from insertion.
    pub cache_ttl: Duration,

    /// Deadline for a single rerank request (and for each scoring call).
    pub request_timeout: Duration,

    /// Load the model at startup instead of on the first scoring call.
    pub preload: bool,

    /// Maximum number of concurrent scoring calls.
    pub workers: usize,

    /// Maximum number of scoring calls waiting for a worker before rejecting.
    pub max_queue: usize,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 10000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_path: None,
            max_length: DEFAULT_MAX_LENGTH,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_SECS),
            preload: false,
            workers: num_cpus::get().max(1),
            max_queue: DEFAULT_MAX_QUEUE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RERANKER_PORT";
    const ENV_HOST: &'static str = "RERANKER_HOST";
    const ENV_MODEL_NAME: &'static str = "RERANKER_MODEL_NAME";
    const ENV_MODEL_PATH: &'static str = "RERANKER_MODEL_PATH";
    const ENV_MAX_LENGTH: &'static str = "RERANKER_MAX_LENGTH";
    const ENV_CACHE_SIZE: &'static str = "RERANKER_CACHE_SIZE";
    const ENV_CACHE_TTL: &'static str = "RERANKER_CACHE_TTL_SECONDS";
    const ENV_REQUEST_TIMEOUT: &'static str = "RERANKER_REQUEST_TIMEOUT_SECONDS";
    const ENV_PRELOAD: &'static str = "RERANKER_PRELOAD";
    const ENV_WORKERS: &'static str = "RERANKER_WORKERS";
    const ENV_MAX_QUEUE: &'static str = "RERANKER_MAX_QUEUE";
    const ENV_LOG_LEVEL: &'static str = "RERANKER_LOG_LEVEL";

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// Numeric settings that fail to parse keep their default; the port and bind
    /// address are strict.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let model_name = Self::parse_string_from_env(Self::ENV_MODEL_NAME, defaults.model_name);
        let model_path = Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH);
        let max_length = Self::parse_usize_from_env(Self::ENV_MAX_LENGTH, defaults.max_length);
        let cache_size = Self::parse_usize_from_env(Self::ENV_CACHE_SIZE, defaults.cache_size);
        let cache_ttl = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_CACHE_TTL,
            defaults.cache_ttl.as_secs(),
        ));
        let request_timeout = Self::parse_seconds_from_env(
            Self::ENV_REQUEST_TIMEOUT,
            defaults.request_timeout,
        );
        let preload = Self::parse_bool_from_env(Self::ENV_PRELOAD, defaults.preload);
        let workers = Self::parse_usize_from_env(Self::ENV_WORKERS, defaults.workers);
        let max_queue = Self::parse_usize_from_env(Self::ENV_MAX_QUEUE, defaults.max_queue);
        let log_level = Self::parse_string_from_env(Self::ENV_LOG_LEVEL, defaults.log_level);

        Ok(Self {
            port,
            bind_addr,
            model_name,
            model_path,
            max_length,
            cache_size,
            cache_ttl,
            request_timeout,
            preload,
            workers,
            max_queue,
            log_level,
        })
    }

    /// Validates paths and basic invariants (does not touch the model files).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size == 0 {
            return Err(ConfigError::MustBePositive { name: "cache_size" });
        }
        if self.workers == 0 {
            return Err(ConfigError::MustBePositive { name: "workers" });
        }
        if self.max_length == 0 {
            return Err(ConfigError::MustBePositive { name: "max_length" });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::MustBePositive {
                name: "request_timeout",
            });
        }

        if let Some(ref path) = self.model_path {
            if !path.exists() {
                return Err(ConfigError::ModelPathMissing { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::ModelPathNotDirectory { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        match self.bind_addr {
            IpAddr::V6(addr) => format!("[{}]:{}", addr, self.port),
            IpAddr::V4(addr) => format!("{}:{}", addr, self.port),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.trim().parse().map_err(|e| ConfigError::MalformedPort {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_HOST) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidHost { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn read_trimmed(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::read_trimmed(var_name).map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::read_trimmed(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        Self::read_trimmed(var_name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        Self::read_trimmed(var_name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_seconds_from_env(var_name: &str, default: Duration) -> Duration {
        Self::read_trimmed(var_name)
            .and_then(|v| v.parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        match Self::read_trimmed(var_name).map(|v| v.to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }
}
