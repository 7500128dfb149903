use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::RerankError;
use super::ranking::rank_scores;
use super::types::{RankingResult, RerankRequest};
use crate::cache::{CacheLookup, CacheStatus, ResultCache, SlotGuard};
use crate::config::Config;
use crate::hashing::Fingerprint;
use crate::health::HealthReporter;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::model::{
    CrossEncoder, InstanceLoader, ModelLifecycle, ModelLoader, loader_from_config,
};
use crate::scoring::{GatewayConfig, ScoringGateway};

/// A successful rerank and how it was served.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub result: Arc<RankingResult>,
    pub status: CacheStatus,
    pub fingerprint: Fingerprint,
}

/// Request pipeline shared by all handlers. Cloning is cheap.
///
/// A miss elects one owner per fingerprint; the owner's computation runs on a
/// detached task and every caller (owner included) waits on the shared slot
/// under its own deadline. A caller that times out or disconnects only stops
/// waiting; the computation still completes and populates the cache.
#[derive(Clone)]
pub struct RerankService {
    cache: ResultCache,
    gateway: ScoringGateway,
    metrics: Metrics,
    health: HealthReporter,
    request_timeout: Duration,
    preload: bool,
}

impl RerankService {
    /// Builds the pipeline around `loader`. The model is not loaded here.
    pub fn new(config: &Config, loader: Arc<dyn ModelLoader>) -> Result<Self, prometheus::Error> {
        let metrics = Metrics::new()?;
        let lifecycle = ModelLifecycle::new(loader);
        let gateway = ScoringGateway::new(
            lifecycle.clone(),
            GatewayConfig::from_config(config),
            metrics.clone(),
        );

        info!(
            model = %lifecycle.model_id(),
            cache_size = config.cache_size,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            workers = gateway.config().concurrency,
            max_queue = config.max_queue,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            "Rerank service configured"
        );

        Ok(Self {
            cache: ResultCache::with_capacity(config.cache_size, config.cache_ttl),
            gateway,
            metrics,
            health: HealthReporter::new(lifecycle, config.preload),
            request_timeout: config.request_timeout,
            preload: config.preload,
        })
    }

    /// Uses the BERT backend when a model path is configured, otherwise the
    /// lexical stand-in.
    pub fn from_config(config: &Config) -> Result<Self, prometheus::Error> {
        if config.model_path.is_none() {
            warn!("RERANKER_MODEL_PATH not set; scores come from the lexical stand-in");
        }
        Self::new(config, loader_from_config(config))
    }

    /// Serves an already constructed encoder.
    pub fn with_encoder(
        config: &Config,
        encoder: Arc<dyn CrossEncoder>,
    ) -> Result<Self, prometheus::Error> {
        Self::new(
            config,
            Arc::new(InstanceLoader::new(&config.model_name, encoder)),
        )
    }

    /// Starts a background model load when preload is enabled.
    pub fn start_preload(&self) -> Option<JoinHandle<()>> {
        if !self.preload {
            return None;
        }
        info!(model = %self.lifecycle().model_id(), "Preloading model");
        Some(self.lifecycle().spawn_preload())
    }

    pub async fn rerank(&self, request: RerankRequest) -> Result<RerankOutcome, RerankError> {
        self.metrics.record_request();

        let outcome = self.execute(request).await;
        if let Err(e) = &outcome {
            self.metrics.record_rerank_failure(e.kind());
        }
        outcome
    }

    /// Counts a request rejected before it could be parsed (malformed body or
    /// schema mismatch) as a validation failure.
    pub fn record_rejected(&self) {
        self.metrics.record_request();
        self.metrics.record_rerank_failure("validation");
    }

    async fn execute(&self, request: RerankRequest) -> Result<RerankOutcome, RerankError> {
        request.validate()?;

        let started = Instant::now();
        let fingerprint = Fingerprint::build(&request);
        let documents = request.documents.len();

        let (waiter, status) = match self.cache.get_or_lock(fingerprint) {
            CacheLookup::Hit(result) => {
                self.metrics.record_cache_hit();
                debug!(fingerprint = ?fingerprint, documents, "Rerank served from cache");
                return Ok(RerankOutcome {
                    result,
                    status: CacheStatus::Hit,
                    fingerprint,
                });
            }
            CacheLookup::Owner(guard) => {
                self.metrics.record_cache_miss();
                let waiter = guard.subscribe();
                self.spawn_computation(guard, request);
                (waiter, CacheStatus::Miss)
            }
            CacheLookup::Waiter(waiter) => {
                self.metrics.record_coalesced();
                debug!(fingerprint = ?fingerprint, "Joined in-flight computation");
                (waiter, CacheStatus::Coalesced)
            }
        };

        let result = match tokio::time::timeout(self.request_timeout, waiter.wait()).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    fingerprint = ?fingerprint,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Gave up waiting for ranking"
                );
                return Err(RerankError::Timeout {
                    after: self.request_timeout,
                });
            }
        };

        debug!(
            fingerprint = ?fingerprint,
            status = %status,
            documents,
            returned = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rerank complete"
        );

        Ok(RerankOutcome {
            result,
            status,
            fingerprint,
        })
    }

    fn spawn_computation(&self, guard: SlotGuard, request: RerankRequest) {
        let gateway = self.gateway.clone();

        tokio::spawn(async move {
            let RerankRequest {
                query,
                documents,
                top_k,
            } = request;
            let texts: Vec<String> = documents.into_iter().map(|d| d.text).collect();

            let outcome = gateway
                .score(query, texts)
                .await
                .map(|scores| Arc::new(rank_scores(&scores, top_k)))
                .map_err(RerankError::from);

            if let Err(e @ RerankError::Internal { .. }) = &outcome {
                error!(fingerprint = ?guard.fingerprint(), error = %e, "Ranking computation failed");
            }

            guard.complete(outcome);
        });
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn gateway(&self) -> &ScoringGateway {
        &self.gateway
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        self.gateway.lifecycle()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.cache.len(), self.cache.inflight_count())
    }

    pub fn prometheus_text(&self) -> Result<String, prometheus::Error> {
        self.metrics
            .encode_prometheus(self.cache.len(), self.cache.inflight_count())
    }
}

impl std::fmt::Debug for RerankService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankService")
            .field("cache", &self.cache)
            .field("gateway", &self.gateway)
            .field("request_timeout", &self.request_timeout)
            .field("preload", &self.preload)
            .finish()
    }
}
