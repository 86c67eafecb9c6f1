//! Property-based tests for tree building, resolution, artifacts, and the
//! scoring pipeline.

use std::time::Duration;

use proptest::prelude::*;

use wordchain::builder::{BuildOutcome, TreeBuilder};
use wordchain::encoding::{decode_tree, encode_tree, from_hex, to_hex};
use wordchain::model::ScriptedModel;
use wordchain::prefix::{PrefixTrie, TrieNode};
use wordchain::scoring::{base_points, creativity_bonus, expand_distribution, score_conditionals};
use wordchain::tree::{Child, ProbabilityNode};
use wordchain::types::{Candidate, Category, TokenId};

const VOCAB: usize = 16;
const BASE: &[TokenId] = &[0];

/// Strategy: 1-6 candidate sequences, each 1-3 tokens over the vocabulary.
fn candidates_strategy() -> impl Strategy<Value = Vec<Candidate>> {
    prop::collection::vec(prop::collection::vec(1u32..VOCAB as u32, 1..=3), 1..=6).prop_map(
        |sequences| {
            sequences
                .into_iter()
                .enumerate()
                .map(|(i, tokens)| {
                    Candidate::new(format!("w{i}"), tokens, Category::OneLetterExchanged)
                })
                .collect()
        },
    )
}

/// Deterministic raw mass for (path, token); `allow_zero` makes ~1/7 of
/// edges massless to exercise pruning.
fn mass(seed: u64, path: &[TokenId], token: TokenId, allow_zero: bool) -> f32 {
    let mut h = seed ^ 0x9e37_79b9_7f4a_7c15;
    for &t in path {
        h = h.wrapping_mul(0x0100_0000_01b3).wrapping_add(t as u64 + 1);
    }
    h = h.wrapping_mul(31).wrapping_add(token as u64);
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 29;
    if allow_zero && h % 7 == 0 {
        0.0
    } else {
        0.05 + (h % 1000) as f32 / 2000.0
    }
}

/// Script one row per trie context so the builder finds every context it
/// could possibly ask for.
fn script_trie(
    model: &mut ScriptedModel,
    node: &TrieNode,
    path: &mut Vec<TokenId>,
    seed: u64,
    allow_zero: bool,
) {
    if !node.has_continuations() {
        return;
    }
    let mut context = BASE.to_vec();
    context.extend_from_slice(path);
    let entries: Vec<(TokenId, f32)> = node
        .children
        .keys()
        .map(|&t| (t, mass(seed, path, t, allow_zero)))
        .collect();
    model.script(&context, &entries);
    for (&token, child) in &node.children {
        path.push(token);
        script_trie(model, child, path, seed, allow_zero);
        path.pop();
    }
}

/// Build a tree from scripted masses. Returns the outcome, the trie's
/// distinct context count, and the distinct input sequence count.
fn run_build(candidates: &[Candidate], seed: u64, allow_zero: bool) -> (BuildOutcome, usize, usize) {
    let trie = PrefixTrie::from_candidates(candidates);
    let mut model = ScriptedModel::new(VOCAB);
    script_trie(&mut model, trie.root(), &mut Vec::new(), seed, allow_zero);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime");
    let builder = TreeBuilder::new(&model, Duration::from_secs(1));
    let outcome = runtime
        .block_on(builder.build(BASE, candidates, 1.0))
        .expect("build");
    (outcome, trie.distinct_contexts(), trie.sequences().len())
}

fn walk_sums(node: &ProbabilityNode) -> Vec<f64> {
    if node.is_leaf() {
        return Vec::new();
    }
    let mut sums = vec![node.children.values().map(Child::probability).sum()];
    for child in node.children.values() {
        if let Some(inner) = child.node() {
            sums.extend(walk_sums(inner));
        }
    }
    sums
}

proptest! {
    // 1. Every built tree satisfies the full invariant sweep.
    #[test]
    fn built_trees_validate(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, _, inputs) = run_build(&candidates, seed, true);
        prop_assert!(outcome.tree.validate().is_ok());
        prop_assert_eq!(outcome.tree.valid_sequences.len() + outcome.pruned_sequences, inputs);
    }

    // 2. With no massless edges nothing prunes: calls hit every distinct
    //    context exactly once and every input sequence survives.
    #[test]
    fn positive_masses_build_everything(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, contexts, inputs) = run_build(&candidates, seed, false);
        prop_assert_eq!(outcome.model_calls, contexts);
        prop_assert_eq!(outcome.pruned_sequences, 0);
        prop_assert_eq!(outcome.tree.valid_sequences.len(), inputs);
        let longest = candidates.iter().map(Candidate::depth).max().unwrap_or(0);
        prop_assert_eq!(outcome.tree.max_depth() as usize, longest);
    }

    // 3. Pruning can only remove work: calls never exceed the trie's
    //    distinct contexts.
    #[test]
    fn pruning_never_adds_calls(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, contexts, _) = run_build(&candidates, seed, true);
        prop_assert!(outcome.model_calls <= contexts);
    }

    // 4. Every non-leaf node's conditionals sum to 1 within tolerance.
    #[test]
    fn nodes_renormalize_to_one(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, _, _) = run_build(&candidates, seed, true);
        for sum in walk_sums(&outcome.tree.root) {
            prop_assert!((sum - 1.0).abs() < 1e-6, "node sum {sum}");
        }
    }

    // 5. Every surviving sequence resolves to one conditional per token,
    //    each in (0, 1].
    #[test]
    fn surviving_sequences_resolve(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, _, _) = run_build(&candidates, seed, true);
        for sequence in &outcome.tree.valid_sequences {
            let conditionals = outcome.tree.resolve(sequence).expect("recorded sequence");
            prop_assert_eq!(conditionals.len(), sequence.len());
            for p in conditionals {
                prop_assert!(p > 0.0 && p <= 1.0 + 1e-9, "conditional {p}");
            }
        }
    }

    // 6. Artifact encoding round-trips built trees exactly.
    #[test]
    fn artifacts_round_trip(candidates in candidates_strategy(), seed in any::<u64>()) {
        let (outcome, _, _) = run_build(&candidates, seed, true);
        let bytes = encode_tree(&outcome.tree).expect("encode");
        prop_assert_eq!(decode_tree(&bytes).expect("decode"), outcome.tree);
    }

    // 7. Hex encoding round-trips arbitrary bytes.
    #[test]
    fn hex_round_trips(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let text = to_hex(&bytes);
        prop_assert_eq!(from_hex(&text).expect("hex"), bytes);
    }

    // 8. Distribution expansion is monotone and stays inside [0, 1].
    #[test]
    fn expansion_monotone_bounded(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (elo, ehi) = (expand_distribution(lo), expand_distribution(hi));
        prop_assert!((0.0..=1.0).contains(&elo));
        prop_assert!((0.0..=1.0).contains(&ehi));
        prop_assert!(elo <= ehi, "expand({lo})={elo} > expand({hi})={ehi}");
    }

    // 9. Scoring any probability vector lands in range and keeps the
    //    pipeline identities.
    #[test]
    fn breakdown_stays_in_range(conditionals in prop::collection::vec(0.001..=1.0f64, 1..8)) {
        let depth = conditionals.len() as f64;
        let breakdown = score_conditionals(conditionals);
        prop_assert!((0.0..=1.0).contains(&breakdown.raw_creativity));
        prop_assert!((0.0..=1.0).contains(&breakdown.final_score));
        prop_assert!((breakdown.length_normalized - breakdown.rms / depth).abs() < 1e-12);
    }

    // 10. Bonus never exceeds half the base (plus rounding) and totals add up.
    #[test]
    fn bonus_bounded_by_half_base(cat_idx in 0..Category::ALL.len(), len in 0usize..12, score in 0.0..=1.0f64) {
        let category = Category::ALL[cat_idx];
        let word = "a".repeat(len);
        let base = base_points(category, &word);
        let bonus = creativity_bonus(base, score);
        prop_assert!(f64::from(bonus) <= f64::from(base) * 0.5 + 0.5);
        prop_assert!(base >= 50, "every table entry and the fallback are at least 50");
    }
}

// 11. A word that is a prefix of another candidate resolves both alone and
//     extended, with the same leading conditional (non-proptest: fixed
//     masses make the expectation exact).
#[test]
fn prefix_words_share_leading_conditionals() {
    let candidates = vec![
        Candidate::new("low", vec![5], Category::OneLetterExchanged),
        Candidate::new("lows", vec![5, 9], Category::OneLetterExchanged),
    ];
    let mut model = ScriptedModel::new(VOCAB);
    model.script(&[0], &[(5, 0.5)]);
    model.script(&[0, 5], &[(9, 0.25)]);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime");
    let builder = TreeBuilder::new(&model, Duration::from_secs(1));
    let outcome = runtime
        .block_on(builder.build(BASE, &candidates, 0.0))
        .expect("build");

    let short = outcome.tree.resolve(&[5]).expect("short");
    let long = outcome.tree.resolve(&[5, 9]).expect("long");
    assert_eq!(short, vec![1.0]);
    assert_eq!(long, vec![1.0, 1.0]);
    assert_eq!(short[0], long[0]);
}
