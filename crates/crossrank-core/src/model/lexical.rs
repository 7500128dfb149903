//! Lexical stand-in for a cross-encoder.
//!
//! Used when no model directory is configured. Scores are a sigmoid over term
//! recall and Jaccard overlap of the non-stop-word terms, so they land in
//! `(0, 1)` and order documents sensibly for smoke tests and local runs.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::ModelError;
use super::{CrossEncoder, ModelLoader};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "to",
    "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through", "during",
    "before", "after", "about", "between", "under", "then", "once", "here", "there", "when",
    "where", "why", "how", "all", "each", "more", "most", "other", "some", "such", "no", "nor",
    "not", "only", "own", "same", "so", "than", "too", "very", "just", "and", "but", "if", "or",
    "because", "until", "while", "what", "which", "who", "whom", "this", "that", "these",
    "those", "am", "it", "its", "i", "you", "we", "they", "me", "my", "your", "our",
];

/// Term-overlap scorer with the [`CrossEncoder`] interface.
#[derive(Debug, Clone)]
pub struct LexicalCrossEncoder {
    stop_words: HashSet<&'static str>,
}

impl Default for LexicalCrossEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalCrossEncoder {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn terms(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !self.stop_words.contains(w))
            .map(str::to_owned)
            .collect()
    }

    fn pair_score(&self, query_terms: &HashSet<String>, query: &str, document: &str) -> f32 {
        if query_terms.is_empty() {
            let shorter = query.len().min(document.len()) as f32;
            let longer = query.len().max(document.len()).max(1) as f32;
            return (shorter / longer) * 0.3;
        }

        let doc_terms = self.terms(document);
        let matches = query_terms.intersection(&doc_terms).count() as f32;
        let recall = matches / query_terms.len() as f32;
        let union = query_terms.union(&doc_terms).count() as f32;
        let jaccard = if union > 0.0 { matches / union } else { 0.0 };

        let base = 0.6 * recall + 0.4 * jaccard;
        (1.0 / (1.0 + (-8.0 * (base - 0.5)).exp())).clamp(0.0, 1.0)
    }
}

impl CrossEncoder for LexicalCrossEncoder {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError> {
        let query_terms = self.terms(query);
        let scores: Vec<f32> = documents
            .iter()
            .map(|doc| self.pair_score(&query_terms, query, doc))
            .collect();

        debug!(
            batch = scores.len(),
            top = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            "Scored batch lexically"
        );
        Ok(scores)
    }

    fn name(&self) -> &str {
        "lexical"
    }

    fn is_stub(&self) -> bool {
        true
    }
}

/// Produces a [`LexicalCrossEncoder`]; never fails.
#[derive(Debug, Clone)]
pub struct StubLoader {
    model_id: String,
}

impl StubLoader {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl ModelLoader for StubLoader {
    fn load(&self) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        info!(model = %self.model_id, "No model path configured, using lexical scorer");
        Ok(Arc::new(LexicalCrossEncoder::new()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
