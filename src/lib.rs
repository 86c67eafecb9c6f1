//! # Wordchain — probability-tree creativity scoring
//!
//! Scores plays in the word-chain game by measuring how *surprising* a valid
//! transformation is to a language model. For each (start word, category)
//! pair the crate compiles the model's next-token distributions — restricted
//! to the tokens of the category's valid candidates — into a sparse
//! probability tree; scoring a play is then an O(depth) walk with no model
//! in the loop.
//!
//! ## Pipeline overview
//!
//! | Stage | Rust module | Description |
//! |-------|-------------|-------------|
//! | 1 | [`lexicon`] | Enumerate valid candidate words per category |
//! | 2 | [`prompt`], [`token`] | Fixed category phrase + tokenization into the model vocabulary |
//! | 3 | [`prefix`] | Merge candidate token sequences into a prefix trie (one model call per distinct context) |
//! | 4 | [`builder`] | Collect raw distributions level by level, then assemble bottom-up with zero-mass pruning and renormalization |
//! | 5 | [`tree`] | The immutable sparse tree: resolution and invariant validation |
//! | 6 | [`scoring`] | RMS-combine conditionals, length-normalize, invert, expand to the final creativity score and point totals |
//! | 7 | [`encoding`], [`store`], [`cache`] | Framed binary artifact, hex-embedded in per-word JSON documents, behind a two-tier cache |
//! | 8 | [`service`] | Async facade: single-flight builds, bounded build concurrency, typed errors |
//!
//! ## Tree representation
//!
//! Each node keeps a `BTreeMap<TokenId, Child>` holding only token indices
//! that lead to at least one surviving candidate, renormalized to sum to 1
//! over exactly those indices. A child is `Terminal(p)` when the candidate
//! ends on that token or `Internal { probability, node }` when candidates
//! continue (covering words that are prefixes of other words). Against a
//! ~50k vocabulary this stores a handful of entries per context instead of a
//! dense row, which is what makes whole trees cheap enough to embed in word
//! documents.
//!
//! ## Key behaviors
//!
//! - The model is called **once per distinct trie context**, never per
//!   candidate; shared prefixes share calls.
//! - Zero-mass pruning cascades: a dead subtree's raw mass leaves its
//!   ancestors' renormalization sums, and nothing below a dead context is
//!   ever submitted to the model.
//! - A category with no (surviving) candidates produces an **explicit empty
//!   tree**, cached and persisted like any other, so "empty" stays distinct
//!   from "never built".
//! - Corrupt or stale cached artifacts are decode-validated and treated as
//!   cache misses: one rebuild, never a served invalid tree.

pub mod builder;
pub mod cache;
pub mod constants;
pub mod encoding;
pub mod env_config;
pub mod errors;
pub mod fixture;
pub mod lexicon;
pub mod model;
pub mod prefix;
pub mod prompt;
pub mod scoring;
pub mod service;
pub mod store;
pub mod token;
pub mod tree;
pub mod types;
