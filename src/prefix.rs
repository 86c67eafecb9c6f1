//! Prefix grouping of candidate token sequences.
//!
//! Candidates sharing the same first k tokens share the same trie path for
//! those k tokens, so each internal trie node corresponds to exactly one
//! model context. This is the mechanism that turns O(candidates) model calls
//! into O(distinct contexts) calls: the builder walks the trie level by
//! level and issues one call per node that still has outgoing edges.
//!
//! Identical token sequences from different source candidates collapse to a
//! single path; the terminal node records every surface word mapped to it.

use std::collections::BTreeMap;

use crate::types::{Candidate, TokenId, TokenSequence};

/// One trie position; the token path from the root is the node's context
/// suffix (the category base context is prepended at call time).
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    /// Outgoing edges: next token → subtree.
    pub children: BTreeMap<TokenId, TrieNode>,
    /// Surface words whose final token lands exactly here.
    pub words: Vec<String>,
}

impl TrieNode {
    /// A candidate ends at this node.
    pub fn is_terminal(&self) -> bool {
        !self.words.is_empty()
    }

    /// This node still has unconsumed suffixes beneath it.
    pub fn has_continuations(&self) -> bool {
        !self.children.is_empty()
    }

    fn insert(&mut self, tokens: &[TokenId], word: &str) {
        match tokens.split_first() {
            None => {
                if !self.words.iter().any(|w| w == word) {
                    self.words.push(word.to_string());
                }
            }
            Some((&head, tail)) => {
                self.children.entry(head).or_default().insert(tail, word);
            }
        }
    }

    fn count_contexts(&self) -> usize {
        if self.children.is_empty() {
            return 0;
        }
        1 + self.children.values().map(TrieNode::count_contexts).sum::<usize>()
    }

    fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }
}

/// Prefix trie over one category's candidate sequences.
#[derive(Debug, Clone, Default)]
pub struct PrefixTrie {
    root: TrieNode,
    sequences: Vec<TokenSequence>,
}

impl PrefixTrie {
    /// Group `candidates` by shared prefix. Empty token sequences are
    /// ignored (they cannot name a word).
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let mut trie = PrefixTrie::default();
        for candidate in candidates {
            trie.insert(&candidate.tokens, &candidate.word);
        }
        trie
    }

    /// Insert one (sequence, surface word) pair.
    pub fn insert(&mut self, tokens: &[TokenId], word: &str) {
        if tokens.is_empty() {
            return;
        }
        if !self.sequences.iter().any(|s| s == tokens) {
            self.sequences.push(tokens.to_vec());
        }
        self.root.insert(tokens, word);
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Distinct token sequences inserted (duplicates collapsed).
    pub fn sequences(&self) -> &[TokenSequence] {
        &self.sequences
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Number of distinct contexts a build must submit to the model: one per
    /// node with at least one outgoing edge (the root included).
    pub fn distinct_contexts(&self) -> usize {
        self.root.count_contexts()
    }

    /// Longest inserted sequence.
    pub fn max_depth(&self) -> usize {
        self.root.depth()
    }
}
