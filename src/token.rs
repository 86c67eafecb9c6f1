//! Tokenizer seam.
//!
//! The core only needs a deterministic word ↔ token-sequence mapping with a
//! fixed vocabulary size; production deployments adapt their model's real
//! tokenizer behind [`Tokenizer`]. [`PieceTokenizer`] is the bundled
//! implementation used by fixtures and tests: greedy longest-match over an
//! explicit piece vocabulary, so every encoding is reproducible by hand.

use std::collections::HashMap;

use crate::errors::TokenizeError;
use crate::types::{TokenId, TokenSequence};

/// Deterministic text ↔ token mapping over a fixed vocabulary.
///
/// `encode(decode(t)) == t` must hold for every sequence the tokenizer
/// produced itself; the builder and scoring paths rely on that to treat
/// token sequences as candidate identities.
pub trait Tokenizer: Send + Sync {
    /// Fixed vocabulary size V.
    fn vocab_size(&self) -> usize;

    /// Tokenize `input`. Fails if any part of the input is not covered by
    /// the vocabulary; never returns an empty sequence for non-empty input.
    fn encode(&self, input: &str) -> Result<TokenSequence, TokenizeError>;

    /// Reassemble the surface text of a token sequence.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizeError>;
}

/// Greedy longest-match tokenizer over an explicit piece list.
///
/// Piece IDs are positions in the construction list. At each input position
/// the longest piece that prefixes the remaining text wins; input not covered
/// by any piece fails with [`TokenizeError::Unencodable`] rather than
/// falling back to an unknown token (a candidate that cannot be tokenized is
/// filtered out before the build, never approximated).
#[derive(Debug)]
pub struct PieceTokenizer {
    piece_to_id: HashMap<String, TokenId>,
    id_to_piece: Vec<String>,
    max_piece_len: usize,
}

impl PieceTokenizer {
    /// Build from a piece list; the first occurrence of a duplicate piece
    /// wins (later duplicates keep their ID but are unreachable by encode).
    pub fn new<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut piece_to_id = HashMap::new();
        let mut id_to_piece = Vec::new();
        let mut max_piece_len = 0;
        for piece in pieces {
            let piece = piece.into();
            let id = id_to_piece.len() as TokenId;
            max_piece_len = max_piece_len.max(piece.chars().count());
            piece_to_id.entry(piece.clone()).or_insert(id);
            id_to_piece.push(piece);
        }
        PieceTokenizer {
            piece_to_id,
            id_to_piece,
            max_piece_len,
        }
    }

    /// ID of an exact piece, if present.
    pub fn piece_id(&self, piece: &str) -> Option<TokenId> {
        self.piece_to_id.get(piece).copied()
    }

    /// Piece text for an ID, if in range.
    pub fn piece(&self, id: TokenId) -> Option<&str> {
        self.id_to_piece.get(id as usize).map(String::as_str)
    }
}

impl Tokenizer for PieceTokenizer {
    fn vocab_size(&self) -> usize {
        self.id_to_piece.len()
    }

    fn encode(&self, input: &str) -> Result<TokenSequence, TokenizeError> {
        if input.is_empty() {
            return Err(TokenizeError::Unencodable {
                input: String::new(),
                rest: String::new(),
            });
        }
        let mut tokens = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            // Longest piece wins; probe length capped at the longest piece.
            let mut matched = None;
            for (chars_used, (idx, ch)) in rest.char_indices().enumerate() {
                if chars_used >= self.max_piece_len {
                    break;
                }
                let end = idx + ch.len_utf8();
                if let Some(&id) = self.piece_to_id.get(&rest[..end]) {
                    matched = Some((id, end));
                }
            }
            match matched {
                Some((id, len)) => {
                    tokens.push(id);
                    rest = &rest[len..];
                }
                None => {
                    return Err(TokenizeError::Unencodable {
                        input: input.to_string(),
                        rest: rest.to_string(),
                    });
                }
            }
        }
        Ok(tokens)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizeError> {
        let mut out = String::new();
        for &id in tokens {
            match self.piece(id) {
                Some(piece) => out.push_str(piece),
                None => return Err(TokenizeError::UnknownId(id)),
            }
        }
        Ok(out)
    }
}
