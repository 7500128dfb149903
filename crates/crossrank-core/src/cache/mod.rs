//! In-memory result cache with single-flight de-duplication.
//!
//! [`ResultCache`] maps a request [`Fingerprint`](crate::hashing::Fingerprint) to its
//! [`RankingResult`](crate::rerank::RankingResult). Concurrent misses for one
//! fingerprint share a single computation through [`SlotGuard`] / [`SlotWaiter`].

mod result;
mod slot;
mod types;


pub use result::{CacheLookup, ResultCache};
pub use slot::{SlotGuard, SlotOutcome, SlotWaiter};
pub use types::{CROSSRANK_CACHE_HEADER, CacheStatus};
