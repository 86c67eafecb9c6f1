//! Creativity scoring.
//!
//! From a built tree and a played word's token sequence:
//!
//! 1) resolve the sequence against the tree, collecting the renormalized
//!    conditional probability of each token;
//! 2) RMS-combine the conditionals: `sqrt(mean(p_i^2))`;
//! 3) length-normalize by token depth so multi-token words are not punished
//!    for accumulating more factors;
//! 4) invert and clamp: `raw = clamp(1 - normalized, 0, 1)` — improbable
//!    picks are the creative ones;
//! 5) expand across [0, 1] with the fixed cube-root/sigmoid/rescale chain so
//!    scores from different categories stay comparable.
//!
//! Point totals put the creativity score on top of a per-category base that
//! grows with word length: `total = base + round(base * 0.5 * score)`.
//!
//! All functions here are pure; tree construction and caching live elsewhere.

use crate::constants::{
    BASE_SCORES, BASE_SCORE_DEFAULT, BASE_SCORE_MIN_LEN, CREATIVITY_BONUS_FACTOR,
    EXPANSION_GAIN, EXPANSION_MIDPOINT, EXPANSION_STEEPNESS,
};
use crate::errors::ScoreError;
use crate::tree::WordProbabilityTree;
use crate::types::{Candidate, Category, CreativityBreakdown, PlayScore, TokenId};

/// Root-mean-square of the conditionals; 0.0 for an empty slice.
///
/// RMS rather than a plain mean: one confident token should dominate the
/// combined probability the way it dominates the model's next-token choice.
pub fn rms(conditionals: &[f64]) -> f64 {
    if conditionals.is_empty() {
        return 0.0;
    }
    let mean_square =
        conditionals.iter().map(|p| p * p).sum::<f64>() / conditionals.len() as f64;
    mean_square.sqrt()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Spread raw creativity values across [0, 1].
///
/// Raw values cluster low (next-token mass over a big vocabulary is almost
/// always small), so ranking on them directly compresses the interesting
/// range. Cube root lifts the low end, the sigmoid re-centers around
/// [`EXPANSION_MIDPOINT`], and the gain pushes the top of the curve to a
/// reachable 1.0. Monotone, so relative order of plays never changes.
pub fn expand_distribution(raw: f64) -> f64 {
    let lifted = raw.cbrt();
    let centered = sigmoid(EXPANSION_STEEPNESS * (lifted - EXPANSION_MIDPOINT));
    (centered * EXPANSION_GAIN).clamp(0.0, 1.0)
}

/// Run stages 2-5 of the pipeline over already-resolved conditionals.
///
/// An empty slice (no tokens consumed) yields an all-zero breakdown.
pub fn score_conditionals(conditionals: Vec<f64>) -> CreativityBreakdown {
    if conditionals.is_empty() {
        return CreativityBreakdown {
            conditionals,
            rms: 0.0,
            length_normalized: 0.0,
            raw_creativity: 0.0,
            final_score: 0.0,
        };
    }
    let rms = rms(&conditionals);
    let length_normalized = rms / conditionals.len() as f64;
    let raw_creativity = (1.0 - length_normalized).clamp(0.0, 1.0);
    let final_score = expand_distribution(raw_creativity);
    CreativityBreakdown {
        conditionals,
        rms,
        length_normalized,
        raw_creativity,
        final_score,
    }
}

/// Full pipeline: resolve `tokens` against `tree`, then score.
pub fn creativity(
    tree: &WordProbabilityTree,
    tokens: &[TokenId],
) -> Result<CreativityBreakdown, ScoreError> {
    let conditionals = tree.resolve(tokens)?;
    Ok(score_conditionals(conditionals))
}

/// Base points for playing `word` in `category`, by letter count.
/// Lengths outside the table fall back to [`BASE_SCORE_DEFAULT`].
pub fn base_points(category: Category, word: &str) -> u32 {
    let len = word.chars().count();
    let row = BASE_SCORES[category.index()];
    match len.checked_sub(BASE_SCORE_MIN_LEN) {
        Some(offset) if offset < row.len() => row[offset],
        _ => BASE_SCORE_DEFAULT,
    }
}

/// Creativity bonus on top of the base: `round(base * 0.5 * score)`.
pub fn creativity_bonus(base_points: u32, final_score: f64) -> u32 {
    (base_points as f64 * CREATIVITY_BONUS_FACTOR * final_score).round() as u32
}

/// Score one play end to end against its category's tree.
pub fn play_score(
    tree: &WordProbabilityTree,
    candidate: &Candidate,
) -> Result<PlayScore, ScoreError> {
    let creativity = creativity(tree, &candidate.tokens)?;
    let base_points = base_points(candidate.category, &candidate.word);
    let creativity_bonus = creativity_bonus(base_points, creativity.final_score);
    Ok(PlayScore {
        word: candidate.word.clone(),
        category: candidate.category,
        total_points: base_points + creativity_bonus,
        base_points,
        creativity_bonus,
        creativity,
    })
}
