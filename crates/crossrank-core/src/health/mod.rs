//! Liveness and readiness probes.
//!
//! Neither probe loads the model. Readiness only gates traffic (the server
//! answers 503) when preload is enabled; with lazy loading the model is loaded
//! by the first rerank call, so "not loaded yet" is reported but not fatal.

use serde::Serialize;

use crate::model::{ModelLifecycle, ModelState};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveReport {
    pub status: &'static str,
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyReport {
    /// `"ok"` when the model is loaded, `"pending"` otherwise.
    pub status: &'static str,
    pub ready: bool,
    pub model_state: ModelState,
    pub preload: bool,
    #[serde(rename = "model")]
    pub model_id: String,
    /// Loaded scoring backend (`bert`, `lexical`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// `"stub"` or `"model"` once loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ReadyReport {
    /// `true` when the probe should fail (preload enabled and model not ready).
    pub fn is_blocking(&self) -> bool {
        self.preload && !self.ready
    }
}

#[derive(Debug, Clone)]
pub struct HealthReporter {
    lifecycle: ModelLifecycle,
    preload: bool,
}

impl HealthReporter {
    pub fn new(lifecycle: ModelLifecycle, preload: bool) -> Self {
        Self { lifecycle, preload }
    }

    pub fn live(&self) -> LiveReport {
        LiveReport { status: "ok" }
    }

    pub fn ready(&self) -> ReadyReport {
        let model_state = self.lifecycle.state();
        let ready = model_state == ModelState::Ready;

        ReadyReport {
            status: if ready { "ok" } else { "pending" },
            ready,
            model_state,
            preload: self.preload,
            model_id: self.lifecycle.model_id().to_string(),
            backend: self.lifecycle.backend(),
            mode: self.lifecycle.mode(),
            last_error: self.lifecycle.last_error(),
        }
    }
}
