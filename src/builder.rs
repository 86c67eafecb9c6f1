//! Tree construction.
//!
//! Two passes per category:
//!
//! 1. **Collect** — level order over the prefix trie. Each trie node with
//!    outgoing edges is one distinct context: issue one model call, record
//!    the full-vocabulary max, keep the raw values at live edges, and drop
//!    the context (with everything beneath it) when no live edge carries
//!    mass. Deeper levels of a dead branch are never submitted to the model.
//! 2. **Assemble** — bottom-up over the same trie. An edge survives if a
//!    candidate ends on it or its subtree survived; survivors are
//!    renormalized over exactly the surviving raw masses, so the per-node
//!    sum-to-one invariant holds even when a deep branch was pruned.
//!
//! A model failure (unavailable, timeout, malformed vector) aborts the whole
//! category build; partial trees are never returned. The builder performs no
//! persistence.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::time::timeout;

use crate::errors::BuildError;
use crate::model::{validate_distribution, LanguageModel};
use crate::prefix::{PrefixTrie, TrieNode};
use crate::tree::{Child, NodeMetadata, ProbabilityNode, WordProbabilityTree};
use crate::types::{Candidate, TokenId, TokenSequence};

/// Raw (unnormalized) sparse distribution collected for one context.
struct SparseRow {
    /// Max over the full vocabulary, before masking.
    original_max: f64,
    /// Live-edge token → raw value; zero-valued edges are not stored.
    raw: BTreeMap<TokenId, f64>,
}

/// A finished build plus its cost accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub tree: WordProbabilityTree,
    /// Distinct contexts submitted to the model.
    pub model_calls: usize,
    /// Candidate sequences dropped by zero-mass pruning.
    pub pruned_sequences: usize,
}

/// Builds one [`WordProbabilityTree`] per call; stateless between builds.
pub struct TreeBuilder<'a, M: LanguageModel> {
    model: &'a M,
    call_timeout: Duration,
}

impl<'a, M: LanguageModel> TreeBuilder<'a, M> {
    /// `call_timeout` bounds each individual model call: the only
    /// cancellation point of a build.
    pub fn new(model: &'a M, call_timeout: Duration) -> Self {
        TreeBuilder { model, call_timeout }
    }

    /// Build the tree for one category's candidate set under `base_context`.
    ///
    /// Zero candidates (or zero surviving candidates) produce the explicit
    /// empty tree without a model call for the dead levels.
    pub async fn build(
        &self,
        base_context: &[TokenId],
        candidates: &[Candidate],
        frequency: f64,
    ) -> Result<BuildOutcome, BuildError> {
        let vocab_size = self.model.vocab_size();
        for candidate in candidates {
            if let Some(&token) = candidate.tokens.iter().find(|&&t| t as usize >= vocab_size) {
                return Err(BuildError::TokenOutOfRange { token, vocab_size });
            }
        }

        let trie = PrefixTrie::from_candidates(candidates);
        if trie.is_empty() {
            return Ok(BuildOutcome {
                tree: WordProbabilityTree::empty(frequency),
                model_calls: 0,
                pruned_sequences: 0,
            });
        }

        let (rows, model_calls) = self.collect_rows(base_context, &trie).await?;

        let root = assemble(trie.root(), &mut Vec::new(), &rows);
        let tree = match root {
            None => WordProbabilityTree::empty(frequency),
            Some(root) => {
                let valid_sequences: Vec<TokenSequence> = trie
                    .sequences()
                    .iter()
                    .filter(|sequence| resolve_on(&root, sequence))
                    .cloned()
                    .collect();
                if valid_sequences.is_empty() {
                    WordProbabilityTree::empty(frequency)
                } else {
                    WordProbabilityTree { frequency, valid_sequences, root }
                }
            }
        };
        let pruned_sequences = trie.sequences().len() - tree.valid_sequences.len();

        debug_assert!(tree.validate().is_ok(), "built tree violates invariants");
        Ok(BuildOutcome { tree, model_calls, pruned_sequences })
    }

    /// Pass 1: one model call per distinct context, level by level.
    async fn collect_rows(
        &self,
        base_context: &[TokenId],
        trie: &PrefixTrie,
    ) -> Result<(HashMap<TokenSequence, SparseRow>, usize), BuildError> {
        let mut rows = HashMap::new();
        let mut model_calls = 0usize;
        let mut frontier: Vec<(&TrieNode, TokenSequence)> = vec![(trie.root(), Vec::new())];

        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for (node, path) in frontier {
                if !node.has_continuations() {
                    continue;
                }
                let mut context = Vec::with_capacity(base_context.len() + path.len());
                context.extend_from_slice(base_context);
                context.extend_from_slice(&path);

                let dense = self.fetch(&context, path.len()).await?;
                model_calls += 1;

                let original_max = dense.iter().copied().fold(0.0f32, f32::max) as f64;
                let mut raw = BTreeMap::new();
                for &token in node.children.keys() {
                    let value = dense[token as usize] as f64;
                    if value > 0.0 {
                        raw.insert(token, value);
                    }
                }
                if raw.is_empty() {
                    // No live edge carries mass: the branch is pruned and
                    // nothing below it is ever submitted to the model.
                    continue;
                }
                for (&token, child) in &node.children {
                    if child.has_continuations() && raw.contains_key(&token) {
                        let mut child_path = path.clone();
                        child_path.push(token);
                        next_frontier.push((child, child_path));
                    }
                }
                rows.insert(path, SparseRow { original_max, raw });
            }
            frontier = next_frontier;
        }
        Ok((rows, model_calls))
    }

    async fn fetch(&self, context: &[TokenId], depth: usize) -> Result<Vec<f32>, BuildError> {
        let dense = match timeout(self.call_timeout, self.model.predict_next_token(context)).await {
            Err(_) => {
                return Err(BuildError::ModelUnavailable(format!(
                    "model call timed out after {} ms",
                    self.call_timeout.as_millis()
                )))
            }
            Ok(Err(err)) => return Err(BuildError::ModelUnavailable(err.to_string())),
            Ok(Ok(dense)) => dense,
        };
        validate_distribution(&dense, self.model.vocab_size())
            .map_err(|fault| BuildError::MalformedDistribution { depth, fault })?;
        Ok(dense)
    }
}

/// Pass 2: bottom-up assembly. Returns `None` when no candidate survives
/// through this trie position.
fn assemble(
    trie_node: &TrieNode,
    path: &mut TokenSequence,
    rows: &HashMap<TokenSequence, SparseRow>,
) -> Option<ProbabilityNode> {
    let row = rows.get(path)?;
    let mut survivors: Vec<(TokenId, f64, Option<ProbabilityNode>)> = Vec::new();
    for (&token, child_trie) in &trie_node.children {
        let Some(&raw_mass) = row.raw.get(&token) else {
            continue;
        };
        let subtree = if child_trie.has_continuations() {
            path.push(token);
            let subtree = assemble(child_trie, path, rows);
            path.pop();
            subtree
        } else {
            None
        };
        match subtree {
            Some(node) => survivors.push((token, raw_mass, Some(node))),
            // A continuation-only edge whose subtree died is dropped; its
            // raw mass leaves the renormalization denominator below.
            None if child_trie.is_terminal() => survivors.push((token, raw_mass, None)),
            None => {}
        }
    }
    if survivors.is_empty() {
        return None;
    }

    let valid_probability_sum: f64 = survivors.iter().map(|(_, mass, _)| mass).sum();
    let mut children = BTreeMap::new();
    let mut max_remaining_depth = 0u32;
    for (token, raw_mass, subtree) in survivors {
        let probability = raw_mass / valid_probability_sum;
        match subtree {
            None => {
                max_remaining_depth = max_remaining_depth.max(1);
                children.insert(token, Child::Terminal(probability));
            }
            Some(node) => {
                max_remaining_depth = max_remaining_depth.max(1 + node.metadata.max_remaining_depth);
                children.insert(token, Child::Internal { probability, node });
            }
        }
    }
    Some(ProbabilityNode {
        children,
        metadata: NodeMetadata {
            original_max: row.original_max,
            valid_probability_sum,
            max_remaining_depth,
        },
    })
}

fn resolve_on(root: &ProbabilityNode, sequence: &[TokenId]) -> bool {
    let mut node = root;
    for (depth, &token) in sequence.iter().enumerate() {
        match node.children.get(&token) {
            None => return false,
            Some(Child::Terminal(_)) => return depth + 1 == sequence.len(),
            Some(Child::Internal { node: next, .. }) => node = next,
        }
    }
    true
}
