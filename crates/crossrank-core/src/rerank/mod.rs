//! Rerank pipeline: validation, fingerprinting, single-flight cache
//! coordination, scoring and ranking.

mod error;
mod ranking;
mod service;
mod types;


pub use error::RerankError;
pub use ranking::rank_scores;
pub use service::{RerankOutcome, RerankService};
pub use types::{Document, RankingResult, RerankRequest, ScoredDocument};
