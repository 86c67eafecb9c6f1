//! Category context templates.
//!
//! Every tree for a (start word, category) pair is conditioned on a fixed
//! English phrase naming the transformation. Templates are part of the
//! artifact's identity: trees built under different phrasings are not
//! interchangeable, so the wording here must never change silently —
//! version-bump the artifact format instead.

use crate::errors::TokenizeError;
use crate::token::Tokenizer;
use crate::types::{Category, TokenSequence};

/// The phrase conditioning all model calls for one (start word, category).
pub fn category_phrase(start_word: &str, category: Category) -> String {
    let tail = match category {
        Category::Anagram => "whose letters can be rearranged to form anagrams like",
        Category::OneLetterAdded => "which with the addition of one letter can become words like",
        Category::OneLetterRemoved => "which with one letter removed can become words like",
        Category::OneLetterExchanged => {
            "which with the change of a single letter can become words like"
        }
        Category::PerfectRhyme => "that rhymes perfectly with words like",
        Category::RichRhyme => "whose homophones are words like",
        Category::SlantRhyme => "that rhymes partially with words like",
    };
    format!("{start_word} is a word {tail}")
}

/// Tokenized base context for a category build.
pub fn base_context(
    tokenizer: &dyn Tokenizer,
    start_word: &str,
    category: Category,
) -> Result<TokenSequence, TokenizeError> {
    tokenizer.encode(&category_phrase(start_word, category))
}
