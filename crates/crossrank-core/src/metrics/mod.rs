//! Service metrics.
//!
//! Counters live in a private Prometheus [`Registry`]; [`Metrics::snapshot`]
//! turns them (plus process usage) into the JSON shape served on `/metrics`, and
//! [`Metrics::encode_prometheus`] renders the text exposition format.

mod process;


use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::Serialize;

pub use process::{MemoryUsage, ProcessUsage};
use process::ProcessSampler;

const NAMESPACE: &str = "crossrank";

/// Failure kinds produced by the scoring gateway.
const SCORING_FAILURE_KINDS: [&str; 4] = ["timeout", "model_unavailable", "backpressure", "internal"];

/// Failure kinds produced by the rerank pipeline.
const RERANK_FAILURE_KINDS: [&str; 5] = [
    "validation",
    "timeout",
    "model_unavailable",
    "backpressure",
    "internal",
];

/// Latency buckets from 1ms to 60s.
const LATENCY_BUCKETS: [f64; 14] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

#[derive(Debug, Clone, Serialize)]
pub struct CacheCounts {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub size: usize,
    pub inflight: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub failures: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringCounts {
    pub calls: u64,
    pub failures: BTreeMap<&'static str, u64>,
    pub latency_avg_ms: f64,
}

/// JSON body of `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub process: ProcessUsage,
    pub cache: CacheCounts,
    pub requests: RequestCounts,
    pub scoring: ScoringCounts,
}

struct Collectors {
    registry: Registry,
    requests_total: IntCounter,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    coalesced_total: IntCounter,
    scoring_calls_total: IntCounter,
    scoring_failures_total: IntCounterVec,
    rerank_failures_total: IntCounterVec,
    inflight_slots: IntGauge,
    cache_entries: IntGauge,
    scoring_latency_seconds: Histogram,
    sampler: Mutex<ProcessSampler>,
}

/// Cheap-to-clone handle to the service metrics.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<Collectors>,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(
            Opts::new("requests_total", "Rerank requests received").namespace(NAMESPACE),
        )?;
        let cache_hits_total = IntCounter::with_opts(
            Opts::new("cache_hits_total", "Rerank requests served from cache").namespace(NAMESPACE),
        )?;
        let cache_misses_total = IntCounter::with_opts(
            Opts::new("cache_misses_total", "Rerank requests not served from cache")
                .namespace(NAMESPACE),
        )?;
        let coalesced_total = IntCounter::with_opts(
            Opts::new(
                "coalesced_total",
                "Cache misses that joined an in-flight computation",
            )
            .namespace(NAMESPACE),
        )?;
        let scoring_calls_total = IntCounter::with_opts(
            Opts::new("scoring_calls_total", "Scoring gateway calls").namespace(NAMESPACE),
        )?;
        let scoring_failures_total = IntCounterVec::new(
            Opts::new("scoring_failures_total", "Failed scoring calls by kind").namespace(NAMESPACE),
            &["kind"],
        )?;
        let rerank_failures_total = IntCounterVec::new(
            Opts::new("rerank_failures_total", "Failed rerank requests by kind").namespace(NAMESPACE),
            &["kind"],
        )?;
        let inflight_slots = IntGauge::with_opts(
            Opts::new("inflight_slots", "Fingerprints currently being computed").namespace(NAMESPACE),
        )?;
        let cache_entries = IntGauge::with_opts(
            Opts::new("cache_entries", "Entries in the result cache").namespace(NAMESPACE),
        )?;
        let scoring_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("scoring_latency_seconds", "Scoring call duration in seconds")
                .namespace(NAMESPACE)
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(coalesced_total.clone()))?;
        registry.register(Box::new(scoring_calls_total.clone()))?;
        registry.register(Box::new(scoring_failures_total.clone()))?;
        registry.register(Box::new(rerank_failures_total.clone()))?;
        registry.register(Box::new(inflight_slots.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(scoring_latency_seconds.clone()))?;

        Ok(Self {
            inner: Arc::new(Collectors {
                registry,
                requests_total,
                cache_hits_total,
                cache_misses_total,
                coalesced_total,
                scoring_calls_total,
                scoring_failures_total,
                rerank_failures_total,
                inflight_slots,
                cache_entries,
                scoring_latency_seconds,
                sampler: Mutex::new(ProcessSampler::new()),
            }),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn record_request(&self) {
        self.inner.requests_total.inc();
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits_total.inc();
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses_total.inc();
    }

    /// A coalesced request is also a cache miss.
    pub fn record_coalesced(&self) {
        self.inner.cache_misses_total.inc();
        self.inner.coalesced_total.inc();
    }

    pub fn record_rerank_failure(&self, kind: &str) {
        self.inner
            .rerank_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Counts a gateway call turned away before reaching a worker. Only the
    /// failure counter moves; calls and latency are left alone.
    pub fn record_scoring_rejection(&self, kind: &str) {
        self.inner
            .scoring_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Records one gateway call that was admitted to a worker and, if it
    /// failed, its failure kind.
    pub fn record_scoring(&self, latency: Duration, failure: Option<&str>) {
        self.inner.scoring_calls_total.inc();
        self.inner
            .scoring_latency_seconds
            .observe(latency.as_secs_f64());

        if let Some(kind) = failure {
            self.inner
                .scoring_failures_total
                .with_label_values(&[kind])
                .inc();
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.inner.requests_total.get()
    }

    pub fn cache_hits(&self) -> u64 {
        self.inner.cache_hits_total.get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.inner.cache_misses_total.get()
    }

    pub fn coalesced(&self) -> u64 {
        self.inner.coalesced_total.get()
    }

    pub fn scoring_calls(&self) -> u64 {
        self.inner.scoring_calls_total.get()
    }

    pub fn scoring_failures(&self, kind: &str) -> u64 {
        self.inner
            .scoring_failures_total
            .with_label_values(&[kind])
            .get()
    }

    pub fn rerank_failures(&self, kind: &str) -> u64 {
        self.inner
            .rerank_failures_total
            .with_label_values(&[kind])
            .get()
    }

    /// Builds the `/metrics` body. Cache figures come from the caller because
    /// the cache owns them.
    pub fn snapshot(&self, cache_size: usize, inflight: usize) -> MetricsSnapshot {
        self.set_cache_gauges(cache_size, inflight);

        let latency = &self.inner.scoring_latency_seconds;
        let samples = latency.get_sample_count();
        let latency_avg_ms = if samples == 0 {
            0.0
        } else {
            latency.get_sample_sum() / samples as f64 * 1000.0
        };

        MetricsSnapshot {
            process: self.inner.sampler.lock().sample(),
            cache: CacheCounts {
                hits: self.cache_hits(),
                misses: self.cache_misses(),
                coalesced: self.coalesced(),
                size: cache_size,
                inflight,
            },
            requests: RequestCounts {
                total: self.requests_total(),
                failures: RERANK_FAILURE_KINDS
                    .iter()
                    .map(|kind| (*kind, self.rerank_failures(kind)))
                    .collect(),
            },
            scoring: ScoringCounts {
                calls: self.scoring_calls(),
                failures: SCORING_FAILURE_KINDS
                    .iter()
                    .map(|kind| (*kind, self.scoring_failures(kind)))
                    .collect(),
                latency_avg_ms,
            },
        }
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn encode_prometheus(
        &self,
        cache_size: usize,
        inflight: usize,
    ) -> Result<String, prometheus::Error> {
        self.set_cache_gauges(cache_size, inflight);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn set_cache_gauges(&self, cache_size: usize, inflight: usize) {
        self.inner.cache_entries.set(cache_size as i64);
        self.inner.inflight_slots.set(inflight as i64);
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_total", &self.requests_total())
            .field("scoring_calls", &self.scoring_calls())
            .finish()
    }
}
