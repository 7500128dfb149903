use super::types::{RankingResult, ScoredDocument};

/// Orders scores into a ranking.
///
/// Sorted by score descending with ties broken by ascending index, then cut to
/// `top_k`. `top_k_applied` is set only when the cut removed something.
pub fn rank_scores(scores: &[f32], top_k: Option<usize>) -> RankingResult {
    let mut rankings: Vec<ScoredDocument> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| ScoredDocument { index, score })
        .collect();

    rankings.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.index.cmp(&b.index))
    });

    let top_k_applied = match top_k {
        Some(k) if k < rankings.len() => {
            rankings.truncate(k);
            true
        }
        _ => false,
    };

    RankingResult {
        rankings,
        top_k_applied,
    }
}
