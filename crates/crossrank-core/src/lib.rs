//! Crossrank library crate (used by the server binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Request pipeline
//! - [`RerankService`] - cache lookup, single-flight coordination, scoring, ranking
//! - [`RerankRequest`], [`Document`], [`RankingResult`], [`ScoredDocument`] - wire types
//! - [`RerankError`] - the error taxonomy surfaced to callers
//!
//! ## Building blocks
//! - [`Fingerprint`] - BLAKE3 request digest used as the cache key
//! - [`ResultCache`] - bounded LRU + TTL store with in-flight slots
//! - [`ScoringGateway`] - bounded-concurrency, deadline-enforcing model calls
//! - [`ModelLifecycle`], [`CrossEncoder`], [`ModelLoader`] - model loading and scoring backends
//! - [`HealthReporter`] - liveness and readiness probes
//! - [`Metrics`] - counters, latency histogram and process usage snapshot
//!
//! ## Test/Mock Support
//! [`model::MockCrossEncoder`] and [`model::MockLoader`] are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod hashing;
pub mod health;
pub mod metrics;
pub mod model;
pub mod rerank;
pub mod scoring;

pub use cache::{
    CROSSRANK_CACHE_HEADER, CacheLookup, CacheStatus, ResultCache, SlotGuard, SlotOutcome,
    SlotWaiter,
};
pub use config::{Config, ConfigError};
pub use hashing::{Fingerprint, hash_to_u64};
pub use health::{HealthReporter, LiveReport, ReadyReport};
pub use metrics::{Metrics, MetricsSnapshot, ProcessUsage};
pub use model::{
    BertCrossEncoder, BertLoader, CrossEncoder, InstanceLoader, LexicalCrossEncoder, ModelError,
    ModelLifecycle, ModelLoader, ModelState, StubLoader, loader_from_config,
};
#[cfg(any(test, feature = "mock"))]
pub use model::{MockCrossEncoder, MockLoader};
pub use rerank::{
    Document, RankingResult, RerankError, RerankOutcome, RerankRequest, RerankService,
    ScoredDocument, rank_scores,
};
pub use scoring::{GatewayConfig, ScoringError, ScoringGateway};
