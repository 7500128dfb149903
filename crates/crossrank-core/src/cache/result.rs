//! Bounded, TTL-expiring result cache.
//!
//! Entries and the in-flight slot table share one mutex, so lookups, inserts and
//! slot registration/release are atomic with respect to each other.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::slot::{SlotGuard, SlotOutcome, SlotSender, SlotWaiter};
use crate::hashing::Fingerprint;
use crate::rerank::RankingResult;

/// Result of [`ResultCache::get_or_lock`].
#[derive(Debug)]
pub enum CacheLookup {
    /// Fresh cached result.
    Hit(Arc<RankingResult>),
    /// Miss; the caller now owns the computation for this fingerprint.
    Owner(SlotGuard),
    /// Miss; another caller is already computing this fingerprint.
    Waiter(SlotWaiter),
}

struct CacheEntry {
    result: Arc<RankingResult>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn new(result: Arc<RankingResult>) -> Self {
        Self {
            result,
            inserted_at: Instant::now(),
        }
    }

    #[inline]
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

struct CacheState {
    entries: LruCache<Fingerprint, CacheEntry>,
    inflight: HashMap<Fingerprint, SlotSender>,
}

impl CacheState {
    fn get_fresh(&mut self, fingerprint: &Fingerprint, ttl: Duration) -> Option<Arc<RankingResult>> {
        // `get` also promotes the entry to most recently used.
        match self.entries.get(fingerprint) {
            None => return None,
            Some(entry) if !entry.is_expired(ttl) => return Some(Arc::clone(&entry.result)),
            Some(_) => {}
        }

        self.entries.pop(fingerprint);
        debug!(fingerprint = ?fingerprint, "Cache entry expired");
        None
    }

    fn insert(&mut self, fingerprint: Fingerprint, result: Arc<RankingResult>, ttl: Duration) {
        let at_capacity = self.entries.len() >= self.entries.cap().get();
        if at_capacity && !self.entries.contains(&fingerprint) {
            self.purge_expired(ttl);
        }

        if let Some((evicted, _)) = self.entries.push(fingerprint, CacheEntry::new(result))
            && evicted != fingerprint
        {
            debug!(evicted = ?evicted, "Evicted least recently used cache entry");
        }
    }

    fn purge_expired(&mut self, ttl: Duration) -> usize {
        let expired: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }

        expired.len()
    }
}

struct Shared {
    state: Mutex<CacheState>,
    ttl: Duration,
}

/// Shared handle to the result cache. Cloning is cheap.
#[derive(Clone)]
pub struct ResultCache {
    shared: Arc<Shared>,
}

impl ResultCache {
    /// Creates a cache holding at most `capacity` results for `ttl` each.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState {
                    entries: LruCache::new(capacity),
                    inflight: HashMap::new(),
                }),
                ttl,
            }),
        }
    }

    /// Creates a cache from a plain capacity (zero is raised to one).
    pub fn with_capacity(capacity: usize, ttl: Duration) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN), ttl)
    }

    /// Returns a fresh cached result, promoting it to most recently used.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<RankingResult>> {
        self.shared
            .state
            .lock()
            .get_fresh(fingerprint, self.shared.ttl)
    }

    /// Stores a result, evicting the least recently used entry when full.
    pub fn put(&self, fingerprint: Fingerprint, result: Arc<RankingResult>) {
        self.shared
            .state
            .lock()
            .insert(fingerprint, result, self.shared.ttl);
    }

    /// Single-flight lookup: a hit, or ownership of / a wait on the computation.
    pub fn get_or_lock(&self, fingerprint: Fingerprint) -> CacheLookup {
        let mut state = self.shared.state.lock();

        if let Some(result) = state.get_fresh(&fingerprint, self.shared.ttl) {
            return CacheLookup::Hit(result);
        }

        if let Some(tx) = state.inflight.get(&fingerprint) {
            return CacheLookup::Waiter(SlotWaiter::new(fingerprint, tx.subscribe()));
        }

        let (tx, _rx) = watch::channel(None);
        state.inflight.insert(fingerprint, tx);
        drop(state);

        debug!(fingerprint = ?fingerprint, "Registered in-flight slot");
        CacheLookup::Owner(SlotGuard::new(self.clone(), fingerprint))
    }

    /// Removes a cached result. Returns `true` if one was present.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.shared.state.lock().entries.pop(fingerprint).is_some()
    }

    /// Drops all cached results. In-flight slots are untouched.
    pub fn clear(&self) {
        self.shared.state.lock().entries.clear();
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.shared.state.lock().purge_expired(self.shared.ttl)
    }

    /// Number of stored entries (expired entries count until purged).
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fingerprints currently being computed.
    pub fn inflight_count(&self) -> usize {
        self.shared.state.lock().inflight.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.state.lock().entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    pub(super) fn subscribe(&self, fingerprint: &Fingerprint) -> Option<SlotWaiter> {
        self.shared
            .state
            .lock()
            .inflight
            .get(fingerprint)
            .map(|tx| SlotWaiter::new(*fingerprint, tx.subscribe()))
    }

    pub(super) fn release(&self, fingerprint: Fingerprint, outcome: SlotOutcome) {
        let mut state = self.shared.state.lock();

        if let Ok(result) = &outcome {
            state.insert(fingerprint, Arc::clone(result), self.shared.ttl);
        }

        if let Some(tx) = state.inflight.remove(&fingerprint) {
            tx.send_replace(Some(outcome));
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ResultCache")
            .field("entries", &state.entries.len())
            .field("capacity", &state.entries.cap())
            .field("inflight", &state.inflight.len())
            .field("ttl", &self.shared.ttl)
            .finish()
    }
}
