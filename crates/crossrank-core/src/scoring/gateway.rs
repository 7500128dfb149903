use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, error, warn};

use super::config::GatewayConfig;
use super::error::ScoringError;
use crate::metrics::Metrics;
use crate::model::ModelLifecycle;

/// Decrements the queue depth when a waiting caller leaves, for any reason.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded, deadline-enforcing access to the cross-encoder.
///
/// At most `concurrency` model calls run at once on the blocking pool, and at
/// most `max_queue` callers wait for a worker; anyone beyond that is rejected
/// with [`ScoringError::Backpressure`]. Each call owns its permit, so a call
/// abandoned on timeout keeps its worker busy until inference really ends.
#[derive(Clone)]
pub struct ScoringGateway {
    lifecycle: ModelLifecycle,
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    config: GatewayConfig,
    metrics: Metrics,
}

impl ScoringGateway {
    pub fn new(lifecycle: ModelLifecycle, config: GatewayConfig, metrics: Metrics) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            lifecycle,
            permits: Arc::new(Semaphore::new(concurrency)),
            queued: Arc::new(AtomicUsize::new(0)),
            config: GatewayConfig {
                concurrency,
                ..config
            },
            metrics,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    /// Model calls currently holding a worker (including abandoned ones).
    pub fn busy(&self) -> usize {
        self.config.concurrency - self.permits.available_permits()
    }

    /// Callers waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Scores every document against `query`, in input order.
    ///
    /// Non-finite scores are replaced with `0.0`.
    pub async fn score(
        &self,
        query: String,
        documents: Vec<String>,
    ) -> Result<Vec<f32>, ScoringError> {
        let started = Instant::now();
        let expected = documents.len();

        let outcome = match tokio::time::timeout(self.config.timeout, self.run(query, documents))
            .await
        {
            Ok(result) => result.and_then(|scores| sanitize(scores, expected)),
            Err(_) => Err(ScoringError::Timeout {
                after: self.config.timeout,
            }),
        };

        let elapsed = started.elapsed();
        match &outcome {
            Err(e @ (ScoringError::Backpressure { .. } | ScoringError::ModelUnavailable { .. })) => {
                self.metrics.record_scoring_rejection(e.kind());
            }
            _ => self
                .metrics
                .record_scoring(elapsed, outcome.as_ref().err().map(ScoringError::kind)),
        }

        match &outcome {
            Ok(_) => debug!(
                documents = expected,
                elapsed_ms = elapsed.as_millis() as u64,
                "Scored batch"
            ),
            Err(e @ ScoringError::Internal { .. }) => error!(error = %e, "Scoring failed"),
            Err(e) => warn!(
                error = %e,
                busy = self.busy(),
                queued = self.queued(),
                "Scoring rejected"
            ),
        }

        outcome
    }

    async fn run(&self, query: String, documents: Vec<String>) -> Result<Vec<f32>, ScoringError> {
        let encoder = self.lifecycle.ensure_loaded().await.map_err(|e| {
            ScoringError::ModelUnavailable {
                reason: e.to_string(),
            }
        })?;

        let permit = self.acquire().await?;

        // The blocking task owns the permit; dropping this future on timeout
        // detaches the task without freeing its worker.
        let worker = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            encoder.score(&query, &documents)
        });

        match worker.await {
            Ok(Ok(scores)) => Ok(scores),
            Ok(Err(e)) => Err(ScoringError::internal(e.to_string())),
            Err(e) => Err(ScoringError::internal(format!("scoring worker failed: {e}"))),
        }
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, ScoringError> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => {
                return Err(ScoringError::internal("scoring workers shut down"));
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        let ahead = self.queued.fetch_add(1, Ordering::AcqRel);
        let _slot = QueueSlot(&self.queued);

        if ahead >= self.config.max_queue {
            return Err(ScoringError::Backpressure {
                queued: ahead,
                limit: self.config.max_queue,
            });
        }

        debug!(position = ahead + 1, "Waiting for a scoring worker");
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScoringError::internal("scoring workers shut down"))
    }
}

fn sanitize(mut scores: Vec<f32>, expected: usize) -> Result<Vec<f32>, ScoringError> {
    if scores.len() != expected {
        return Err(ScoringError::internal(format!(
            "model returned {} scores for {expected} documents",
            scores.len()
        )));
    }

    for (index, score) in scores.iter_mut().enumerate() {
        if !score.is_finite() {
            error!(index, score = %score, "Model produced a non-finite score, using 0.0");
            *score = 0.0;
        }
    }

    Ok(scores)
}

impl std::fmt::Debug for ScoringGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringGateway")
            .field("config", &self.config)
            .field("busy", &self.busy())
            .field("queued", &self.queued())
            .finish()
    }
}
