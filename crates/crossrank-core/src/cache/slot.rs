//! Single-flight slots.
//!
//! The first caller to miss on a fingerprint receives a [`SlotGuard`] and owns the
//! computation; everyone else receives a [`SlotWaiter`]. The outcome is published
//! once, through a `watch` channel, to all waiters at the same time.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use super::result::ResultCache;
use crate::hashing::Fingerprint;
use crate::rerank::{RankingResult, RerankError};

/// Shared outcome of one in-flight computation.
pub type SlotOutcome = Result<Arc<RankingResult>, RerankError>;

pub(super) type SlotSender = watch::Sender<Option<SlotOutcome>>;

/// Ownership of the in-flight slot for one fingerprint.
///
/// Must be finished with [`SlotGuard::complete`]. Dropping it uncompleted
/// releases waiters with an internal error.
pub struct SlotGuard {
    cache: ResultCache,
    fingerprint: Fingerprint,
    released: bool,
}

impl SlotGuard {
    pub(super) fn new(cache: ResultCache, fingerprint: Fingerprint) -> Self {
        Self {
            cache,
            fingerprint,
            released: false,
        }
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Returns a waiter on this slot's outcome.
    pub fn subscribe(&self) -> SlotWaiter {
        self.cache
            .subscribe(&self.fingerprint)
            .unwrap_or_else(|| SlotWaiter::closed(self.fingerprint))
    }

    /// Publishes the outcome, caching it on success, and frees the slot.
    pub fn complete(mut self, outcome: SlotOutcome) {
        self.released = true;
        self.cache.release(self.fingerprint, outcome);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                fingerprint = ?self.fingerprint,
                "In-flight computation dropped without a result"
            );
            self.cache.release(
                self.fingerprint,
                Err(RerankError::internal("computation abandoned before completion")),
            );
        }
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("fingerprint", &self.fingerprint)
            .field("released", &self.released)
            .finish()
    }
}

/// A caller waiting for another caller's computation.
pub struct SlotWaiter {
    fingerprint: Fingerprint,
    rx: watch::Receiver<Option<SlotOutcome>>,
}

impl SlotWaiter {
    pub(super) fn new(fingerprint: Fingerprint, rx: watch::Receiver<Option<SlotOutcome>>) -> Self {
        Self { fingerprint, rx }
    }

    fn closed(fingerprint: Fingerprint) -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { fingerprint, rx }
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Waits for the slot to be released.
    ///
    /// Dropping the returned future only detaches this waiter; the computation
    /// and other waiters are unaffected.
    pub async fn wait(mut self) -> SlotOutcome {
        let outcome = match self.rx.wait_for(|value| value.is_some()).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            Err(RerankError::internal(
                "in-flight computation ended without a result",
            ))
        })
    }
}

impl std::fmt::Debug for SlotWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotWaiter")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
