//! Error taxonomy.
//!
//! Build-time failures abort the whole category's tree (no partial trees are
//! persisted or served). Scoring-time failures are returned to the caller as
//! typed results, never silently defaulted to a score of 0. Persistence
//! write failures are logged and do not fail the in-memory result; corrupt
//! cached artifacts are treated as cache misses.
//!
//! Build and scoring errors are `Clone` because an in-flight build's outcome
//! is broadcast to every concurrent requester of the same tree key.

use thiserror::Error;

use crate::types::{Category, TokenId};

/// Why a dense model vector was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DistributionFault {
    #[error("expected {expected} entries, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("negative value at index {index}")]
    Negative { index: usize },
}

/// Failure reported by a language model backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model backend: {0}")]
pub struct ModelError(pub String);

/// Failure reported by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("no token covers {rest:?} while encoding {input:?}")]
    Unencodable { input: String, rest: String },
    #[error("unknown token id {0}")]
    UnknownId(TokenId),
}

/// Failure reported by a candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("candidate source: {0}")]
pub struct LexiconError(pub String);

/// Errors that abort a whole category's tree build.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Model call failed or timed out. Nothing is cached.
    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),
    /// Model returned a vector of the wrong length or with NaN/negative
    /// entries. `depth` is the token depth of the offending context.
    #[error("malformed distribution at depth {depth}: {fault}")]
    MalformedDistribution { depth: usize, fault: DistributionFault },
    /// A candidate's token ID exceeds the model vocabulary — the tokenizer
    /// and model disagree about the vocabulary.
    #[error("token {token} out of range for vocabulary of {vocab_size}")]
    TokenOutOfRange { token: TokenId, vocab_size: usize },
    /// Candidate enumeration failed for the start word.
    #[error("candidate lookup failed: {0}")]
    CandidateSource(String),
    /// The category's base context could not be tokenized.
    #[error("context encoding failed for {word:?}: {source}")]
    ContextEncoding { word: String, source: TokenizeError },
}

/// Scoring-time failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// The requested token sequence was not compiled into the tree. A caller
    /// contract violation (candidate not in the category's set, or pruned
    /// during the build), not a transient error; retrying cannot succeed.
    #[error("token {token} not in tree at depth {depth}")]
    CandidateNotInTree { token: TokenId, depth: usize },
    /// No tree exists yet for the key. The async service reacts by building;
    /// synchronous cache users surface it to the caller.
    #[error("no tree built for {word:?} category {category}")]
    TreeNotBuilt { word: String, category: Category },
}

/// Persistent store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("document parse: {0}")]
    Document(#[from] serde_json::Error),
}

/// Artifact decode failures. Every variant maps to cache-miss semantics:
/// the cached bytes are discarded and the tree is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("artifact truncated: {got} bytes")]
    Truncated { got: usize },
    #[error("bad magic 0x{got:08x}")]
    BadMagic { got: u32 },
    #[error("unsupported artifact version {got}")]
    BadVersion { got: u32 },
    #[error("payload length mismatch: header says {expected}, body has {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("payload decode: {0}")]
    Payload(String),
    #[error("hex payload: {0}")]
    Hex(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Artifact encode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("artifact encode: {0}")]
pub struct EncodeError(pub String);

/// Top-level error surfaced by the scoring service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_format_with_context() {
        let err = BuildError::MalformedDistribution {
            depth: 2,
            fault: DistributionFault::NonFinite { index: 17 },
        };
        let text = err.to_string();
        assert!(text.contains("depth 2"));
        assert!(text.contains("index 17"));
    }

    #[test]
    fn service_error_is_transparent() {
        let err: ServiceError = ScoreError::CandidateNotInTree { token: 9, depth: 1 }.into();
        assert_eq!(err.to_string(), "token 9 not in tree at depth 1");
    }
}
