use serde::{Deserialize, Serialize};

use crossrank::{RankingResult, ScoredDocument};

/// Body of a successful `POST /rerank`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RerankResponse {
    pub rankings: Vec<ScoredDocument>,
    pub top_k_applied: bool,
}

impl From<&RankingResult> for RerankResponse {
    fn from(result: &RankingResult) -> Self {
        Self {
            rankings: result.rankings.clone(),
            top_k_applied: result.top_k_applied,
        }
    }
}

/// Body of every error response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub kind: String,
}
