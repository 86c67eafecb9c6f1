//! Language model seam.
//!
//! The model is consumed as a black box: context tokens in, one dense
//! next-token distribution over the full vocabulary out. It is the dominant
//! cost of a tree build (95%+ of wall-clock in the reference deployment), so
//! everything upstream is organized around calling it once per distinct
//! context and never more.
//!
//! [`ScriptedModel`] is the bundled deterministic implementation: explicit
//! context → sparse-distribution rows, a call counter, and optional
//! artificial latency. It backs the fixture binaries and the test suite.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{DistributionFault, ModelError};
use crate::types::{TokenId, TokenSequence};

/// Autoregressive next-token model over a fixed vocabulary.
///
/// `predict_next_token` must be a pure function of the context: same context,
/// same vector. Values are unnormalized non-negative likelihoods; callers
/// renormalize over the indices they care about.
pub trait LanguageModel: Send + Sync {
    /// Fixed vocabulary size V; every returned vector has exactly this length.
    fn vocab_size(&self) -> usize;

    /// Dense distribution over the next token given `context`.
    fn predict_next_token(
        &self,
        context: &[TokenId],
    ) -> impl Future<Output = Result<Vec<f32>, ModelError>> + Send;
}

/// Reject vectors that violate the model contract: wrong length, NaN or
/// infinite entries, negative entries.
pub fn validate_distribution(values: &[f32], expected_len: usize) -> Result<(), DistributionFault> {
    if values.len() != expected_len {
        return Err(DistributionFault::WrongLength {
            expected: expected_len,
            got: values.len(),
        });
    }
    for (index, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(DistributionFault::NonFinite { index });
        }
        if v < 0.0 {
            return Err(DistributionFault::Negative { index });
        }
    }
    Ok(())
}

/// Deterministic model double driven by scripted rows.
///
/// Each row maps an exact context to sparse `(token, probability)` entries;
/// unlisted vocabulary indices are 0. Requests for an unscripted context fail
/// with [`ModelError`], which keeps fixture gaps loud instead of silently
/// returning flat distributions.
#[derive(Debug)]
pub struct ScriptedModel {
    vocab_size: usize,
    rows: HashMap<TokenSequence, Vec<(TokenId, f32)>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(vocab_size: usize) -> Self {
        ScriptedModel {
            vocab_size,
            rows: HashMap::new(),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the distribution returned for `context`. Later calls for the
    /// same context replace the earlier row.
    pub fn script(&mut self, context: &[TokenId], entries: &[(TokenId, f32)]) -> &mut Self {
        debug_assert!(
            entries.iter().all(|&(t, _)| (t as usize) < self.vocab_size),
            "scripted token beyond vocab_size"
        );
        self.rows.insert(context.to_vec(), entries.to_vec());
        self
    }

    /// Add artificial per-call latency (for timeout and concurrency tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `predict_next_token` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of scripted rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl LanguageModel for ScriptedModel {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    async fn predict_next_token(&self, context: &[TokenId]) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let row = self.rows.get(context).ok_or_else(|| {
            ModelError(format!("no scripted distribution for context {:?}", context))
        })?;
        let mut dense = vec![0.0f32; self.vocab_size];
        for &(token, p) in row {
            dense[token as usize] = p;
        }
        Ok(dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_catches_each_fault() {
        assert_eq!(
            validate_distribution(&[0.1, 0.2], 3),
            Err(DistributionFault::WrongLength { expected: 3, got: 2 })
        );
        assert_eq!(
            validate_distribution(&[0.1, f32::NAN, 0.2], 3),
            Err(DistributionFault::NonFinite { index: 1 })
        );
        assert_eq!(
            validate_distribution(&[0.1, 0.2, -0.5], 3),
            Err(DistributionFault::Negative { index: 2 })
        );
        assert_eq!(validate_distribution(&[0.0, 0.5, 0.5], 3), Ok(()));
    }

    #[tokio::test]
    async fn scripted_rows_come_back_dense() {
        let mut model = ScriptedModel::new(5);
        model.script(&[1, 2], &[(0, 0.6), (3, 0.2)]);
        let dense = model.predict_next_token(&[1, 2]).await.unwrap();
        assert_eq!(dense, vec![0.6, 0.0, 0.0, 0.2, 0.0]);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn unscripted_context_fails_loudly() {
        let model = ScriptedModel::new(4);
        let err = model.predict_next_token(&[7]).await.unwrap_err();
        assert!(err.to_string().contains("no scripted distribution"));
        assert_eq!(model.call_count(), 1);
    }
}
