//! Test doubles for the model layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::error::ModelError;
use super::{CrossEncoder, ModelLoader};

type ScoreFn = dyn Fn(&str, &[String]) -> Vec<f32> + Send + Sync;

/// Scriptable [`CrossEncoder`].
///
/// By default every document scores `1 / (index + 1)`, so input order is also
/// the ranking order. Clones share the call counter.
#[derive(Clone)]
pub struct MockCrossEncoder {
    scorer: Arc<ScoreFn>,
    delay: Duration,
    failure: Option<ModelError>,
    calls: Arc<AtomicUsize>,
}

impl MockCrossEncoder {
    pub fn new() -> Self {
        Self {
            scorer: Arc::new(|_: &str, documents: &[String]| {
                (0..documents.len())
                    .map(|i| 1.0 / (i as f32 + 1.0))
                    .collect()
            }),
            delay: Duration::ZERO,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns `scores` verbatim, whatever the batch size.
    pub fn with_scores(mut self, scores: Vec<f32>) -> Self {
        self.scorer = Arc::new(move |_: &str, _: &[String]| scores.clone());
        self
    }

    pub fn with_scorer<F>(mut self, scorer: F) -> Self
    where
        F: Fn(&str, &[String]) -> Vec<f32> + Send + Sync + 'static,
    {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Blocks the scoring thread for `delay` on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: ModelError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCrossEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossEncoder for MockCrossEncoder {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok((self.scorer)(query, documents))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl std::fmt::Debug for MockCrossEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCrossEncoder")
            .field("delay", &self.delay)
            .field("failure", &self.failure)
            .field("calls", &self.call_count())
            .finish()
    }
}

/// Scriptable [`ModelLoader`] that hands out a [`MockCrossEncoder`].
#[derive(Debug, Clone)]
pub struct MockLoader {
    encoder: MockCrossEncoder,
    failure: Option<ModelError>,
    delay: Duration,
    loads: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new(encoder: MockCrossEncoder) -> Self {
        Self {
            encoder,
            failure: None,
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every load attempt fails with `error`.
    pub fn failing(mut self, error: ModelError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of load attempts so far, including failed ones.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for MockLoader {
    fn load(&self) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(Arc::new(self.encoder.clone())),
        }
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}
