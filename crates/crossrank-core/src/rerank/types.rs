use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::RerankError;

/// A single candidate document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text scored against the query. Also accepted as `content` or `answer`.
    #[serde(alias = "content", alias = "answer")]
    pub text: String,

    /// Caller metadata; carried on the wire but never scored or fingerprinted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }
}

/// Payload of a rerank call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl RerankRequest {
    pub fn new<I, S>(query: impl Into<String>, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            documents: documents.into_iter().map(Document::new).collect(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Checks request-level invariants.
    ///
    /// A `top_k` larger than the document count is accepted and clamped at ranking
    /// time. Documents with empty text are scored anyway but logged.
    pub fn validate(&self) -> Result<(), RerankError> {
        if self.query.is_empty() {
            return Err(RerankError::validation("query must not be empty"));
        }

        if self.documents.is_empty() {
            return Err(RerankError::validation("documents list must not be empty"));
        }

        if self.top_k == Some(0) {
            return Err(RerankError::validation("top_k must be at least 1"));
        }

        for (index, doc) in self.documents.iter().enumerate() {
            if doc.text.trim().is_empty() {
                warn!(index, "Document has empty text; its score may be meaningless");
            }
        }

        Ok(())
    }
}

/// One scored document, addressed by its position in the request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub index: usize,
    pub score: f32,
}

/// Ranked scores for one request fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// Sorted by score descending, ties by index ascending.
    pub rankings: Vec<ScoredDocument>,

    /// `true` only if `top_k` actually removed candidates.
    pub top_k_applied: bool,
}

impl RankingResult {
    pub fn len(&self) -> usize {
        self.rankings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }

    pub fn top(&self) -> Option<&ScoredDocument> {
        self.rankings.first()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.rankings.iter().map(|r| r.index).collect()
    }
}
