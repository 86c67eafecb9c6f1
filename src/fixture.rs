//! Fixture bundles for the operational binaries.
//!
//! A bundle is one JSON file describing a deterministic playground: tokenizer
//! pieces, the candidate lexicon, and the scripted model rows. Contexts and
//! row entries are written as piece strings so fixtures stay readable and
//! hand-editable; loading resolves them to token IDs against the piece list
//! and fails loudly on any piece the vocabulary does not contain.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::lexicon::{StaticLexicon, WordEntry};
use crate::model::ScriptedModel;
use crate::token::{PieceTokenizer, Tokenizer};

/// On-disk fixture schema.
#[derive(Debug, Deserialize)]
pub struct FixtureBundle {
    /// Tokenizer pieces; token IDs are list positions.
    pub pieces: Vec<String>,
    /// Start word → frequency and per-category candidate lists.
    #[serde(default)]
    pub words: HashMap<String, WordEntry>,
    /// Scripted model rows.
    #[serde(default)]
    pub rows: Vec<FixtureRow>,
}

/// One scripted distribution: exact context (as piece strings, in order) →
/// unnormalized next-token values keyed by piece string.
#[derive(Debug, Deserialize)]
pub struct FixtureRow {
    pub context: Vec<String>,
    pub probs: HashMap<String, f32>,
}

/// A bundle resolved into runnable components.
#[derive(Debug)]
pub struct Fixture {
    pub tokenizer: PieceTokenizer,
    pub model: ScriptedModel,
    pub lexicon: StaticLexicon,
}

impl FixtureBundle {
    pub fn load(path: &Path) -> Result<FixtureBundle, String> {
        let bytes = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("parsing {}: {e}", path.display()))
    }

    /// Resolve piece strings into tokenizer, model, and lexicon.
    pub fn assemble(&self) -> Result<Fixture, String> {
        let tokenizer = PieceTokenizer::new(self.pieces.iter().cloned());
        let mut model = ScriptedModel::new(tokenizer.vocab_size());
        for (index, row) in self.rows.iter().enumerate() {
            let mut context = Vec::with_capacity(row.context.len());
            for piece in &row.context {
                let id = tokenizer
                    .piece_id(piece)
                    .ok_or_else(|| format!("row {index}: context piece {piece:?} not in pieces"))?;
                context.push(id);
            }
            let mut entries = Vec::with_capacity(row.probs.len());
            for (piece, &p) in &row.probs {
                let id = tokenizer
                    .piece_id(piece)
                    .ok_or_else(|| format!("row {index}: prob piece {piece:?} not in pieces"))?;
                entries.push((id, p));
            }
            entries.sort_by_key(|&(id, _)| id);
            model.script(&context, &entries);
        }
        let mut lexicon = StaticLexicon::new();
        for (word, entry) in &self.words {
            lexicon.insert(word, entry.clone());
        }
        Ok(Fixture {
            tokenizer,
            model,
            lexicon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::CandidateSource;
    use crate::types::Category;

    fn bundle() -> FixtureBundle {
        serde_json::from_value(serde_json::json!({
            "pieces": ["hat", "bat", " tail"],
            "words": {
                "hat": {
                    "frequency": 5.1,
                    "candidates": {"olx": ["bat"]}
                }
            },
            "rows": [
                {"context": ["hat", " tail"], "probs": {"bat": 0.3}}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn bundle_assembles_into_runnable_parts() {
        let fixture = bundle().assemble().unwrap();
        assert_eq!(fixture.tokenizer.vocab_size(), 3);
        assert_eq!(fixture.lexicon.frequency("hat"), 5.1);
        assert_eq!(
            fixture
                .lexicon
                .candidates("hat", Category::OneLetterExchanged)
                .unwrap(),
            vec!["bat"]
        );
        use crate::model::LanguageModel;
        let dense = fixture.model.predict_next_token(&[0, 2]).await.unwrap();
        assert_eq!(dense, vec![0.0, 0.3, 0.0]);
    }

    #[test]
    fn unknown_pieces_fail_assembly() {
        let mut bad = bundle();
        bad.rows[0].context.push("missing".to_string());
        let err = bad.assemble().unwrap_err();
        assert!(err.contains("missing"), "{err}");
    }
}
