//! Game-wide constants: category codes, scoring tables, transform parameters,
//! and the binary artifact format identifiers.

/// Number of transformation categories.
pub const CATEGORY_COUNT: usize = 7;

/// Category codes in canonical order: anagram, one-letter-added/removed/
/// exchanged, perfect/rich/slant rhyme.
pub const CATEGORY_CODES: [&str; CATEGORY_COUNT] = ["ana", "ola", "olr", "olx", "prf", "rch", "sln"];

/// Tolerance for the per-node normalization invariant: at every non-leaf
/// node the children's conditional probabilities must sum to 1.0 within this.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

// ── Creativity distribution expansion ───────────────────────────────
//
// Raw creativity values cluster narrowly because next-token mass over a large
// vocabulary is almost always tiny. The fixed three-stage expansion
// (cube root -> sigmoid -> rescale) spreads them over [0, 1] identically at
// every call site so cross-category rankings stay comparable.

/// Sigmoid steepness `k` in `sigmoid(k * (x - x0))`.
pub const EXPANSION_STEEPNESS: f64 = 2.5;
/// Sigmoid midpoint `x0`.
pub const EXPANSION_MIDPOINT: f64 = 0.3;
/// Linear gain applied after the sigmoid, before clamping to [0, 1].
pub const EXPANSION_GAIN: f64 = 1.2;

/// Creativity bonus factor: `bonus = base * CREATIVITY_BONUS_FACTOR * score`.
pub const CREATIVITY_BONUS_FACTOR: f64 = 0.5;

/// Word lengths covered by the base-score tables (inclusive).
pub const BASE_SCORE_MIN_LEN: usize = 3;
/// See [`BASE_SCORE_MIN_LEN`].
pub const BASE_SCORE_MAX_LEN: usize = 7;
/// Base points for word lengths outside the table range.
pub const BASE_SCORE_DEFAULT: u32 = 100;

/// Base points per category, indexed by word length 3..=7.
///
/// Row order matches [`CATEGORY_CODES`]. Anagrams ramp steepest (hardest to
/// find at length), rich rhymes next, perfect rhymes cheapest.
pub const BASE_SCORES: [[u32; 5]; CATEGORY_COUNT] = [
    [100, 300, 500, 700, 900], // ana
    [100, 200, 300, 400, 500], // ola
    [100, 200, 300, 400, 500], // olr
    [100, 200, 300, 400, 500], // olx
    [50, 100, 150, 200, 250],  // prf
    [150, 300, 450, 600, 750], // rch
    [75, 150, 225, 300, 375],  // sln
];

// ── Tree artifact format ────────────────────────────────────────────

/// Magic bytes "WCTR" identifying an encoded probability tree.
pub const TREE_ARTIFACT_MAGIC: u32 = 0x5254_4357;
/// Current artifact format version.
pub const TREE_ARTIFACT_VERSION: u32 = 1;
/// Header length in bytes: magic, version, payload length, node count.
pub const TREE_ARTIFACT_HEADER_LEN: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_spells_wctr() {
        assert_eq!(&TREE_ARTIFACT_MAGIC.to_le_bytes(), b"WCTR");
    }

    #[test]
    fn base_score_rows_cover_all_categories() {
        assert_eq!(BASE_SCORES.len(), CATEGORY_CODES.len());
        for row in BASE_SCORES {
            assert_eq!(row.len(), BASE_SCORE_MAX_LEN - BASE_SCORE_MIN_LEN + 1);
        }
    }
}
