use std::time::Duration;

use crate::config::Config;

/// Limits applied by the [`ScoringGateway`](super::ScoringGateway).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Model calls allowed to run at once.
    pub concurrency: usize,
    /// Callers allowed to wait for a free worker; `0` rejects as soon as all are busy.
    pub max_queue: usize,
    /// Deadline for one call, covering the queue wait and inference.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.workers.max(1),
            max_queue: config.max_queue,
            timeout: config.request_timeout,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
