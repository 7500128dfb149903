use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::ModelError;
use super::{CrossEncoder, ModelLoader};

const WARMUP_QUERY: &str = "test query";
const WARMUP_DOCUMENT: &str = "test document";

/// Load state of the scoring model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ModelState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl ModelState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ModelState::Loading,
            2 => ModelState::Ready,
            3 => ModelState::Failed,
            _ => ModelState::Uninitialized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Uninitialized => "uninitialized",
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Inner {
    loader: Arc<dyn ModelLoader>,
    state: AtomicU8,
    encoder: RwLock<Option<Arc<dyn CrossEncoder>>>,
    last_error: RwLock<Option<ModelError>>,
    /// Completed load attempts, successful or not.
    attempts: AtomicU64,
    load_lock: Mutex<()>,
}

/// Owns the lazily loaded cross-encoder.
///
/// At most one load runs at a time, and callers that queued behind a load share
/// its outcome. A failed load leaves the model `Failed`; the next
/// [`ensure_loaded`](Self::ensure_loaded) call made after it tries again.
#[derive(Clone)]
pub struct ModelLifecycle {
    inner: Arc<Inner>,
}

impl ModelLifecycle {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                state: AtomicU8::new(ModelState::Uninitialized as u8),
                encoder: RwLock::new(None),
                last_error: RwLock::new(None),
                attempts: AtomicU64::new(0),
                load_lock: Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> ModelState {
        ModelState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    pub fn model_id(&self) -> &str {
        self.inner.loader.model_id()
    }

    /// Message of the most recent failed load, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().as_ref().map(ToString::to_string)
    }

    /// Name of the loaded scoring backend, `None` until a load succeeds.
    pub fn backend(&self) -> Option<String> {
        self.encoder().map(|encoder| encoder.name().to_string())
    }

    /// `"stub"` when a heuristic stand-in serves scores, `"model"` for a real
    /// cross-encoder, `None` until a load succeeds.
    pub fn mode(&self) -> Option<&'static str> {
        self.encoder()
            .map(|encoder| if encoder.is_stub() { "stub" } else { "model" })
    }

    /// The loaded encoder, without triggering a load.
    pub fn encoder(&self) -> Option<Arc<dyn CrossEncoder>> {
        self.inner.encoder.read().clone()
    }

    /// Returns the encoder, loading it first if needed.
    ///
    /// The load itself runs on a detached task, so a caller that gives up (for
    /// example on a request deadline) does not abort a load other callers are
    /// waiting on.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        if let Some(encoder) = self.encoder() {
            return Ok(encoder);
        }

        let seen = self.inner.attempts.load(Ordering::Acquire);
        let this = self.clone();
        tokio::spawn(async move { this.load_once(seen).await })
            .await
            .map_err(|e| ModelError::LoadFailed {
                reason: format!("load task failed: {e}"),
            })?
    }

    /// Starts loading in the background and returns immediately.
    pub fn spawn_preload(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.ensure_loaded().await {
                error!(error = %e, model = %this.model_id(), "Model preload failed");
            }
        })
    }

    /// `seen` is the attempt count observed before queueing for the lock.
    async fn load_once(&self, seen: u64) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        let _guard = self.inner.load_lock.lock().await;

        // Another caller may have finished loading while we waited for the lock.
        if let Some(encoder) = self.encoder() {
            return Ok(encoder);
        }
        if self.inner.attempts.load(Ordering::Acquire) > seen
            && let Some(error) = self.inner.last_error.read().clone()
        {
            return Err(error);
        }

        self.set_state(ModelState::Loading);
        let started = Instant::now();
        let loader = Arc::clone(&self.inner.loader);

        let loaded = tokio::task::spawn_blocking(move || {
            let encoder = loader.load()?;
            warm_up(encoder.as_ref());
            Ok::<_, ModelError>(encoder)
        })
        .await
        .map_err(|e| ModelError::LoadFailed {
            reason: format!("load worker failed: {e}"),
        })
        .and_then(|result| result);

        match loaded {
            Ok(encoder) => {
                *self.inner.encoder.write() = Some(Arc::clone(&encoder));
                *self.inner.last_error.write() = None;
                self.set_state(ModelState::Ready);
                self.inner.attempts.fetch_add(1, Ordering::AcqRel);
                if encoder.is_stub() {
                    warn!(
                        model = %self.model_id(),
                        backend = encoder.name(),
                        "Serving heuristic scores, not a trained cross-encoder"
                    );
                }
                info!(
                    model = %self.model_id(),
                    backend = encoder.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model ready"
                );
                Ok(encoder)
            }
            Err(e) => {
                *self.inner.last_error.write() = Some(e.clone());
                self.set_state(ModelState::Failed);
                self.inner.attempts.fetch_add(1, Ordering::AcqRel);
                error!(
                    model = %self.model_id(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model load failed"
                );
                Err(e)
            }
        }
    }

    fn set_state(&self, state: ModelState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }
}

fn warm_up(encoder: &dyn CrossEncoder) {
    match encoder.score(WARMUP_QUERY, &[WARMUP_DOCUMENT.to_string()]) {
        Ok(scores) if scores.iter().all(|s| s.is_finite()) => {
            info!(score = ?scores.first(), "Warm-up inference succeeded");
        }
        Ok(scores) => warn!(scores = ?scores, "Warm-up inference produced non-finite scores"),
        Err(e) => warn!(error = %e, "Warm-up inference failed"),
    }
}

impl std::fmt::Debug for ModelLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLifecycle")
            .field("model_id", &self.model_id())
            .field("state", &self.state())
            .finish()
    }
}
