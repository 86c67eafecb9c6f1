//! Candidate source seam.
//!
//! The linguistic generators that enumerate anagram/one-letter-off/rhyme
//! candidates live outside this crate; [`CandidateSource`] is the contract
//! the scoring service calls before any tree build. [`StaticLexicon`] is the
//! bundled table-backed implementation used by fixtures and tests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::LexiconError;
use crate::types::Category;

/// Per-category candidate lists and corpus frequencies for start words.
pub trait CandidateSource: Send + Sync {
    /// Valid target words for `start_word` under `category`. An unknown word
    /// yields an empty list (which builds the explicit empty tree), not an
    /// error.
    fn candidates(&self, start_word: &str, category: Category) -> Result<Vec<String>, LexiconError>;

    /// Corpus frequency of `word`, used only for suggestion ranking and
    /// diagnostics (never for creativity). Unknown words are 0.0.
    fn frequency(&self, word: &str) -> f64;
}

/// One start word's lexicon entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordEntry {
    #[serde(default)]
    pub frequency: f64,
    /// Category code (`ana`, `ola`, ...) → candidate words.
    #[serde(default)]
    pub candidates: HashMap<String, Vec<String>>,
}

/// In-memory candidate tables, deserializable from fixture JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticLexicon {
    entries: HashMap<String, WordEntry>,
}

impl StaticLexicon {
    pub fn new() -> Self {
        StaticLexicon::default()
    }

    /// Insert (or replace) the entry for `word`; the key is lowercased.
    pub fn insert(&mut self, word: &str, entry: WordEntry) {
        self.entries.insert(word.to_lowercase(), entry);
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CandidateSource for StaticLexicon {
    fn candidates(&self, start_word: &str, category: Category) -> Result<Vec<String>, LexiconError> {
        let words = self
            .entries
            .get(&start_word.to_lowercase())
            .and_then(|entry| entry.candidates.get(category.code()))
            .cloned()
            .unwrap_or_default();
        Ok(words)
    }

    fn frequency(&self, word: &str) -> f64 {
        self.entries
            .get(&word.to_lowercase())
            .map(|entry| entry.frequency)
            .unwrap_or(0.0)
    }
}
