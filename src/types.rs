//! Core shared types: token aliases, transformation categories, tree keys,
//! candidates, and score breakdowns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::CATEGORY_COUNT;

/// Integer ID from the model's fixed vocabulary.
pub type TokenId = u32;

/// Ordered token-ID sequence (a word or a model context).
pub type TokenSequence = Vec<TokenId>;

/// The seven recognized transformation kinds.
///
/// Wire/storage code is the three-letter tag (`ana`, `ola`, `olr`, `olx`,
/// `prf`, `rch`, `sln`); the persisted word document groups the one-letter-off
/// categories under `olo.*` and the rhyme categories under `rhy.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Anagram,
    OneLetterAdded,
    OneLetterRemoved,
    OneLetterExchanged,
    PerfectRhyme,
    RichRhyme,
    SlantRhyme,
}

impl Category {
    /// All categories in canonical code order.
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Anagram,
        Category::OneLetterAdded,
        Category::OneLetterRemoved,
        Category::OneLetterExchanged,
        Category::PerfectRhyme,
        Category::RichRhyme,
        Category::SlantRhyme,
    ];

    /// Three-letter category code.
    pub fn code(self) -> &'static str {
        match self {
            Category::Anagram => "ana",
            Category::OneLetterAdded => "ola",
            Category::OneLetterRemoved => "olr",
            Category::OneLetterExchanged => "olx",
            Category::PerfectRhyme => "prf",
            Category::RichRhyme => "rch",
            Category::SlantRhyme => "sln",
        }
    }

    /// Parse a three-letter code.
    pub fn from_code(code: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Position in [`Category::ALL`] (row index into the base-score table).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Dotted path of this category's artifact inside the persisted word
    /// document: `ana`, `olo.<code>` for one-letter-off, `rhy.<code>` for
    /// rhymes.
    pub fn document_path(self) -> &'static str {
        match self {
            Category::Anagram => "ana",
            Category::OneLetterAdded => "olo.ola",
            Category::OneLetterRemoved => "olo.olr",
            Category::OneLetterExchanged => "olo.olx",
            Category::PerfectRhyme => "rhy.prf",
            Category::RichRhyme => "rhy.rch",
            Category::SlantRhyme => "rhy.sln",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identity of one probability tree: (start word, category).
///
/// The word is normalized to lowercase on construction so that lookups,
/// in-flight build deduplication, and persistence all agree on one spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeKey {
    pub word: String,
    pub category: Category,
}

impl TreeKey {
    pub fn new(word: &str, category: Category) -> Self {
        TreeKey {
            word: word.trim().to_lowercase(),
            category,
        }
    }
}

impl fmt::Display for TreeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.word, self.category)
    }
}

/// One target word for one transformation category, already tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub word: String,
    pub tokens: TokenSequence,
    pub category: Category,
}

impl Candidate {
    pub fn new(word: impl Into<String>, tokens: TokenSequence, category: Category) -> Self {
        Candidate {
            word: word.into(),
            tokens,
            category,
        }
    }

    /// Token depth (number of tokens the candidate spans).
    pub fn depth(&self) -> usize {
        self.tokens.len()
    }
}

/// Intermediate values of the creativity pipeline for one candidate.
///
/// `final_score` is the only value fed into point totals; the rest are kept
/// for diagnostics and for callers that surface the raw conditionals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativityBreakdown {
    /// Renormalized per-token conditional probabilities, root first.
    pub conditionals: Vec<f64>,
    /// `sqrt(mean(p_i^2))` over `conditionals`.
    pub rms: f64,
    /// `rms / token_depth`.
    pub length_normalized: f64,
    /// `1 - length_normalized`, clamped to [0, 1].
    pub raw_creativity: f64,
    /// Expanded score in [0, 1] (cube root, sigmoid, rescale).
    pub final_score: f64,
}

/// Full point outcome for one scored play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayScore {
    pub word: String,
    pub category: Category,
    pub creativity: CreativityBreakdown,
    /// Base points for (category, word length).
    pub base_points: u32,
    /// `base * 0.5 * final_score`, rounded.
    pub creativity_bonus: u32,
    pub total_points: u32,
}
