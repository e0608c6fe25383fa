//! Score ranking for detection candidates.

use std::cmp::Ordering;

/// One anchor instance ranked by confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankedCandidate {
    /// Position in the flattened `[H][W][A]` score buffer.
    pub index: usize,
    /// Confidence score at `index`.
    pub score: f32,
}

fn candidate_cmp_desc(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

/// Ranks all scores descending and returns the first `top_k`.
///
/// Ties are broken by ascending buffer index, so the order is total and
/// deterministic. Scores are compared with `f32::total_cmp`, which places a
/// positive NaN above every number. `top_k` larger than `scores.len()` simply
/// returns every candidate.
pub fn rank_by_score(scores: &[f32], top_k: usize) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| RankedCandidate { index, score })
        .collect();

    let k = top_k.min(ranked.len());
    if k == 0 {
        return Vec::new();
    }
    if k < ranked.len() {
        ranked.select_nth_unstable_by(k - 1, candidate_cmp_desc);
        ranked.truncate(k);
    }
    ranked.sort_by(candidate_cmp_desc);
    ranked
}
