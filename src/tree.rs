//! The sparse probability tree.
//!
//! One tree per (start word, category). Each node holds the model's
//! next-token distribution at one context, restricted to the token indices
//! that lead to at least one surviving candidate and renormalized over
//! exactly those indices. A child is either a bare terminal probability
//! (candidate ends on that token) or an edge probability plus a nested node
//! (candidates continue). Sparseness is the storage story: for a ~50k
//! vocabulary a context keeps a handful of entries instead of a dense
//! vector, which is where the three-orders-of-magnitude artifact size
//! reduction comes from.
//!
//! Trees are immutable once built. Resolution is an O(depth) walk; all
//! mutation happens in the builder before the tree is ever shared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::NORMALIZATION_TOLERANCE;
use crate::errors::ScoreError;
use crate::types::{TokenId, TokenSequence};

/// Distribution metadata captured when a node's context was expanded.
///
/// `original_max` and `valid_probability_sum` describe the unnormalized
/// model vector the sparse children came from (`normalized child i =
/// raw(i) / valid_probability_sum`); they are retained for diagnostics and
/// for the superseded ratio-based creativity scaling that older artifacts
/// were scored with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Maximum unnormalized value across the full vocabulary at this context.
    pub original_max: f64,
    /// Sum of unnormalized values across the surviving child indices,
    /// computed before renormalization.
    pub valid_probability_sum: f64,
    /// Longest token suffix still consumable beneath this node (0 at a node
    /// with no children; a terminal child counts 1).
    pub max_remaining_depth: u32,
}

/// A node's sparse child: candidate ends here, or continues below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Child {
    /// The candidate's final token: bare conditional probability.
    Terminal(f64),
    /// The edge's conditional probability plus the next level's
    /// distribution. Also covers the case where one candidate ends on this
    /// token while another continues through it.
    Internal { probability: f64, node: ProbabilityNode },
}

impl Child {
    /// Conditional probability of taking this edge from the parent context.
    pub fn probability(&self) -> f64 {
        match self {
            Child::Terminal(p) => *p,
            Child::Internal { probability, .. } => *probability,
        }
    }

    /// Nested node, if the candidate set continues below this edge.
    pub fn node(&self) -> Option<&ProbabilityNode> {
        match self {
            Child::Terminal(_) => None,
            Child::Internal { node, .. } => Some(node),
        }
    }
}

/// One context's renormalized sparse distribution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbabilityNode {
    /// Ordered sparse map: token ID → child. Only indices with at least one
    /// surviving candidate appear.
    pub children: BTreeMap<TokenId, Child>,
    pub metadata: NodeMetadata,
}

impl ProbabilityNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nodes in this subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .values()
            .filter_map(Child::node)
            .map(ProbabilityNode::node_count)
            .sum::<usize>()
    }

    /// Stored child entries in this subtree (terminal and internal edges).
    pub fn entry_count(&self) -> usize {
        self.children.len()
            + self
                .children
                .values()
                .filter_map(Child::node)
                .map(ProbabilityNode::entry_count)
                .sum::<usize>()
    }

    fn check(&self, path: &mut TokenSequence) -> Result<(), String> {
        if self.is_leaf() {
            if self.metadata.max_remaining_depth != 0 {
                return Err(format!(
                    "leaf at {:?} claims remaining depth {}",
                    path, self.metadata.max_remaining_depth
                ));
            }
            return Ok(());
        }

        let sum: f64 = self.children.values().map(Child::probability).sum();
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
            return Err(format!("children at {:?} sum to {}", path, sum));
        }
        if !(self.metadata.valid_probability_sum.is_finite()
            && self.metadata.valid_probability_sum > 0.0)
        {
            return Err(format!(
                "non-positive valid probability sum {} at {:?}",
                self.metadata.valid_probability_sum, path
            ));
        }
        // original_max spans the full vocabulary, so it bounds every
        // surviving raw mass: raw(i) = p(i) * valid_sum <= original_max.
        let max_child = self
            .children
            .values()
            .map(Child::probability)
            .fold(0.0f64, f64::max);
        let max_raw = max_child * self.metadata.valid_probability_sum;
        if self.metadata.original_max + NORMALIZATION_TOLERANCE < max_raw {
            return Err(format!(
                "original max {} below largest raw child {} at {:?}",
                self.metadata.original_max, max_raw, path
            ));
        }

        let mut expected_depth = 0;
        for (&token, child) in &self.children {
            let p = child.probability();
            if !(p.is_finite() && p >= 0.0 && p <= 1.0 + NORMALIZATION_TOLERANCE) {
                path.push(token);
                let msg = format!("probability {} out of range at {:?}", p, path);
                path.pop();
                return Err(msg);
            }
            match child {
                Child::Terminal(_) => expected_depth = expected_depth.max(1),
                Child::Internal { node, .. } => {
                    expected_depth = expected_depth.max(1 + node.metadata.max_remaining_depth);
                    path.push(token);
                    let result = node.check(path);
                    path.pop();
                    result?;
                }
            }
        }
        if self.metadata.max_remaining_depth != expected_depth {
            return Err(format!(
                "remaining depth {} at {:?}, children imply {}",
                self.metadata.max_remaining_depth, path, expected_depth
            ));
        }
        Ok(())
    }
}

/// The per-(start word, category) artifact: root distribution, the candidate
/// sequences compiled into it, and the start word's corpus frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProbabilityTree {
    /// Corpus frequency of the start word (suggestion ranking only).
    pub frequency: f64,
    /// Every candidate token sequence that survived the build. Sequences
    /// pruned for zero mass are absent; resolving them fails.
    pub valid_sequences: Vec<TokenSequence>,
    pub root: ProbabilityNode,
}

impl WordProbabilityTree {
    /// The explicit empty tree: a category with zero surviving candidates.
    /// Persisted like any other tree so "empty" stays distinguishable from
    /// "never built".
    pub fn empty(frequency: f64) -> Self {
        WordProbabilityTree {
            frequency,
            valid_sequences: Vec::new(),
            root: ProbabilityNode::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Longest compiled candidate, in tokens.
    pub fn max_depth(&self) -> u32 {
        self.root.metadata.max_remaining_depth
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn entry_count(&self) -> usize {
        self.root.entry_count()
    }

    /// Walk the tree consuming `tokens`, collecting the conditional
    /// probability of each consumed token.
    ///
    /// Fails with [`ScoreError::CandidateNotInTree`] as soon as a token has
    /// no entry at the current node, or when tokens remain after a terminal
    /// child — both mean the sequence was never compiled into this tree.
    pub fn resolve(&self, tokens: &[TokenId]) -> Result<Vec<f64>, ScoreError> {
        debug_assert!(!tokens.is_empty(), "resolving an empty sequence");
        let mut conditionals = Vec::with_capacity(tokens.len());
        let mut node = &self.root;
        for (depth, &token) in tokens.iter().enumerate() {
            match node.children.get(&token) {
                None => return Err(ScoreError::CandidateNotInTree { token, depth }),
                Some(Child::Terminal(p)) => {
                    conditionals.push(*p);
                    if depth + 1 < tokens.len() {
                        return Err(ScoreError::CandidateNotInTree {
                            token: tokens[depth + 1],
                            depth: depth + 1,
                        });
                    }
                }
                Some(Child::Internal { probability, node: next }) => {
                    conditionals.push(*probability);
                    node = next;
                }
            }
        }
        Ok(conditionals)
    }

    /// Check every structural invariant: per-node normalization within
    /// tolerance, metadata consistency, the bottom-up depth law, and that
    /// each recorded sequence actually resolves. Used on every artifact
    /// decode; a failure is treated as a cache miss upstream.
    pub fn validate(&self) -> Result<(), String> {
        if !self.frequency.is_finite() || self.frequency < 0.0 {
            return Err(format!("bad frequency {}", self.frequency));
        }
        if self.is_empty() {
            if !self.valid_sequences.is_empty() {
                return Err("empty root but non-empty sequence list".to_string());
            }
            let meta = &self.root.metadata;
            if *meta != NodeMetadata::default() {
                return Err("empty tree carries non-zero metadata".to_string());
            }
            return Ok(());
        }
        if self.valid_sequences.is_empty() {
            return Err("non-empty root but no recorded sequences".to_string());
        }
        self.root.check(&mut Vec::new())?;
        for sequence in &self.valid_sequences {
            if sequence.is_empty() {
                return Err("empty sequence recorded".to_string());
            }
            if let Err(err) = self.resolve(sequence) {
                return Err(format!("recorded sequence {:?} unresolvable: {}", sequence, err));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// hat/olx from the worked scenario: "bat" 0.60, "cat" 0.40 at the root.
    fn bat_cat_tree() -> WordProbabilityTree {
        let mut children = BTreeMap::new();
        children.insert(1, Child::Terminal(0.6));
        children.insert(2, Child::Terminal(0.4));
        WordProbabilityTree {
            frequency: 5.1,
            valid_sequences: vec![vec![1], vec![2]],
            root: ProbabilityNode {
                children,
                metadata: NodeMetadata {
                    original_max: 0.6,
                    valid_probability_sum: 1.0,
                    max_remaining_depth: 1,
                },
            },
        }
    }

    /// Two-level tree: [5] terminal-and-continuing into [5, 9].
    fn chain_tree() -> WordProbabilityTree {
        let mut inner_children = BTreeMap::new();
        inner_children.insert(9, Child::Terminal(1.0));
        let inner = ProbabilityNode {
            children: inner_children,
            metadata: NodeMetadata {
                original_max: 0.9,
                valid_probability_sum: 0.9,
                max_remaining_depth: 1,
            },
        };
        let mut children = BTreeMap::new();
        children.insert(5, Child::Internal { probability: 0.7, node: inner });
        children.insert(6, Child::Terminal(0.3));
        WordProbabilityTree {
            frequency: 1.0,
            valid_sequences: vec![vec![5], vec![5, 9], vec![6]],
            root: ProbabilityNode {
                children,
                metadata: NodeMetadata {
                    original_max: 0.35,
                    valid_probability_sum: 0.5,
                    max_remaining_depth: 2,
                },
            },
        }
    }

    #[test]
    fn resolve_collects_conditionals_in_order() {
        let tree = bat_cat_tree();
        assert_eq!(tree.resolve(&[1]).unwrap(), vec![0.6]);
        assert_eq!(tree.resolve(&[2]).unwrap(), vec![0.4]);

        let chain = chain_tree();
        assert_eq!(chain.resolve(&[5]).unwrap(), vec![0.7]);
        assert_eq!(chain.resolve(&[5, 9]).unwrap(), vec![0.7, 1.0]);
        assert_eq!(chain.resolve(&[6]).unwrap(), vec![0.3]);
    }

    #[test]
    fn resolve_rejects_unknown_paths() {
        let tree = bat_cat_tree();
        assert_eq!(
            tree.resolve(&[7]),
            Err(ScoreError::CandidateNotInTree { token: 7, depth: 0 })
        );
        // Tokens remaining past a terminal child.
        assert_eq!(
            tree.resolve(&[1, 4]),
            Err(ScoreError::CandidateNotInTree { token: 4, depth: 1 })
        );
        let chain = chain_tree();
        assert_eq!(
            chain.resolve(&[5, 8]),
            Err(ScoreError::CandidateNotInTree { token: 8, depth: 1 })
        );
    }

    #[test]
    fn validate_accepts_well_formed_trees() {
        bat_cat_tree().validate().unwrap();
        chain_tree().validate().unwrap();
        WordProbabilityTree::empty(0.0).validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_normalization() {
        let mut tree = bat_cat_tree();
        tree.root.children.insert(1, Child::Terminal(0.7));
        let err = tree.validate().unwrap_err();
        assert!(err.contains("sum to"), "{err}");
    }

    #[test]
    fn validate_rejects_depth_mismatch() {
        let mut tree = chain_tree();
        tree.root.metadata.max_remaining_depth = 1;
        let err = tree.validate().unwrap_err();
        assert!(err.contains("remaining depth"), "{err}");
    }

    #[test]
    fn validate_rejects_metadata_contradiction() {
        let mut tree = bat_cat_tree();
        // Largest raw child would be 0.6 * 1.0 = 0.6 > claimed full-vocab max.
        tree.root.metadata.original_max = 0.1;
        let err = tree.validate().unwrap_err();
        assert!(err.contains("original max"), "{err}");
    }

    #[test]
    fn validate_rejects_unresolvable_sequences() {
        let mut tree = bat_cat_tree();
        tree.valid_sequences.push(vec![1, 2]);
        let err = tree.validate().unwrap_err();
        assert!(err.contains("unresolvable"), "{err}");
    }

    #[test]
    fn empty_sentinel_is_distinguishable() {
        let empty = WordProbabilityTree::empty(2.0);
        assert!(empty.is_empty());
        assert_eq!(empty.max_depth(), 0);
        assert_eq!(empty.node_count(), 1);
        assert!(!bat_cat_tree().is_empty());
    }

    #[test]
    fn counts_cover_all_nodes_and_entries() {
        let chain = chain_tree();
        assert_eq!(chain.node_count(), 2);
        assert_eq!(chain.entry_count(), 3);
        assert_eq!(chain.max_depth(), 2);
    }
}
