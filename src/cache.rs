//! Two-tier tree cache.
//!
//! Tier 1 is a capacity-bounded in-memory map of decoded trees with
//! least-recently-used eviction. Tier 2 is the word-document store, holding
//! each tree hex-encoded at its category's dotted path. A store hit decodes,
//! re-validates, and promotes into memory; anything wrong with the stored
//! bytes (hex, framing, payload, invariants) is logged and treated as a
//! miss, so a corrupt document costs one rebuild, never an error to the
//! player.
//!
//! Persistence failures on `put` are logged and reported as
//! [`PutStatus::WriteFailed`]; the tree stays served from memory either way.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::encoding::{decode_tree_hex, encode_tree_hex};
use crate::store::{set_at, word_key, DocumentStore};
use crate::tree::WordProbabilityTree;
use crate::types::TreeKey;

/// Outcome of [`TreeCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStatus {
    /// Cached in memory and merged into the word document.
    Persisted,
    /// Cached in memory; the document write failed and was logged.
    WriteFailed,
}

/// Counter snapshot. Hits count both tiers; a store hit is still a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Trees currently resident in the memory tier.
    pub resident: usize,
}

struct CacheInner {
    trees: HashMap<TreeKey, Arc<WordProbabilityTree>>,
    /// Keys from least to most recently used.
    order: VecDeque<TreeKey>,
}

pub struct TreeCache {
    store: Arc<dyn DocumentStore>,
    /// Memory-tier capacity; 0 disables the memory tier entirely.
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TreeCache {
    pub fn new(store: Arc<dyn DocumentStore>, capacity: usize) -> Self {
        TreeCache {
            store,
            capacity,
            inner: Mutex::new(CacheInner {
                trees: HashMap::new(),
                order: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Look the key up in memory, then in the document store.
    pub fn get(&self, key: &TreeKey) -> Option<Arc<WordProbabilityTree>> {
        if self.capacity > 0 {
            let mut inner = self.lock();
            if let Some(tree) = inner.trees.get(key).cloned() {
                promote(&mut inner.order, key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(tree);
            }
        }
        match self.load_from_store(key) {
            Some(tree) => {
                let tree = Arc::new(tree);
                self.insert(key, Arc::clone(&tree));
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(tree)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache a freshly built tree and merge it into the word document.
    pub fn put(&self, key: &TreeKey, tree: Arc<WordProbabilityTree>) -> PutStatus {
        self.insert(key, Arc::clone(&tree));
        let hex = match encode_tree_hex(&tree) {
            Ok(hex) => hex,
            Err(err) => {
                log::warn!("encoding tree {key} failed: {err}");
                return PutStatus::WriteFailed;
            }
        };
        let mut patch = Value::Object(serde_json::Map::new());
        set_at(
            &mut patch,
            &format!("{}.tree", key.category.document_path()),
            json!(hex),
        );
        set_at(&mut patch, "frequency", json!(tree.frequency));
        match self.store.merge(&word_key(&key.word), &patch) {
            Ok(()) => PutStatus::Persisted,
            Err(err) => {
                log::warn!("persisting tree {key} failed: {err}; serving from memory");
                PutStatus::WriteFailed
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resident: self.lock().trees.len(),
        }
    }

    fn load_from_store(&self, key: &TreeKey) -> Option<WordProbabilityTree> {
        let path = format!("{}.tree", key.category.document_path());
        let value = match self.store.get(&word_key(&key.word), &path) {
            Ok(value) => value?,
            Err(err) => {
                log::warn!("reading document for {key} failed: {err}");
                return None;
            }
        };
        let Value::String(hex) = value else {
            log::warn!("document field {path} for {key} is not a string; rebuilding");
            return None;
        };
        match decode_tree_hex(&hex) {
            Ok(tree) => Some(tree),
            Err(err) => {
                log::warn!("cached artifact for {key} invalid: {err}; rebuilding");
                None
            }
        }
    }

    fn insert(&self, key: &TreeKey, tree: Arc<WordProbabilityTree>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        if inner.trees.insert(key.clone(), tree).is_some() {
            promote(&mut inner.order, key);
            return;
        }
        inner.order.push_back(key.clone());
        while inner.trees.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else { break };
            inner.trees.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn promote(order: &mut VecDeque<TreeKey>, key: &TreeKey) {
    order.retain(|k| k != key);
    order.push_back(key.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tree::{Child, NodeMetadata, ProbabilityNode};
    use crate::types::Category;
    use std::collections::BTreeMap;

    fn tree(p: f64) -> Arc<WordProbabilityTree> {
        let mut children = BTreeMap::new();
        children.insert(1, Child::Terminal(p));
        children.insert(2, Child::Terminal(1.0 - p));
        Arc::new(WordProbabilityTree {
            frequency: 5.1,
            valid_sequences: vec![vec![1], vec![2]],
            root: ProbabilityNode {
                children,
                metadata: NodeMetadata {
                    original_max: p.max(1.0 - p),
                    valid_probability_sum: 1.0,
                    max_remaining_depth: 1,
                },
            },
        })
    }

    fn key(word: &str) -> TreeKey {
        TreeKey::new(word, Category::OneLetterExchanged)
    }

    #[test]
    fn memory_hit_after_put() {
        let cache = TreeCache::new(Arc::new(MemoryStore::new()), 8);
        assert_eq!(cache.get(&key("hat")), None);
        cache.put(&key("hat"), tree(0.6));
        assert_eq!(cache.get(&key("hat")), Some(tree(0.6)));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.resident), (1, 1, 1));
    }

    #[test]
    fn store_tier_survives_memory_loss() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let cache = TreeCache::new(Arc::clone(&store), 8);
        assert_eq!(cache.put(&key("hat"), tree(0.6)), PutStatus::Persisted);

        // Fresh cache over the same store: memory empty, store supplies it.
        let rebuilt = TreeCache::new(store, 8);
        assert_eq!(rebuilt.get(&key("hat")), Some(tree(0.6)));
        assert_eq!(rebuilt.stats().hits, 1);
        assert_eq!(rebuilt.stats().resident, 1);
    }

    #[test]
    fn document_layout_has_tree_and_frequency() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let cache = TreeCache::new(Arc::clone(&store), 8);
        cache.put(&key("hat"), tree(0.6));
        let doc = store.document("word:hat").unwrap().unwrap();
        assert!(doc["olo"]["olx"]["tree"].is_string());
        assert_eq!(doc["frequency"], json!(5.1));
    }

    #[test]
    fn corrupt_artifact_is_a_miss() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .set("word:hat", "olo.olx.tree", json!("not-hex!"))
            .unwrap();
        let cache = TreeCache::new(store, 8);
        assert_eq!(cache.get(&key("hat")), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn lru_eviction_respects_recent_use() {
        let cache = TreeCache::new(Arc::new(MemoryStore::new()), 2);
        cache.put(&key("aa"), tree(0.6));
        cache.put(&key("bb"), tree(0.6));
        cache.get(&key("aa")); // aa becomes most recent
        cache.put(&key("cc"), tree(0.6)); // bb evicted
        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.resident, 2);

        // bb is gone from memory but still served through the store tier.
        let inner_resident: Vec<_> = ["aa", "bb", "cc"]
            .iter()
            .map(|w| cache.lock().trees.contains_key(&key(w)))
            .collect();
        assert_eq!(inner_resident, vec![true, false, true]);
        assert!(cache.get(&key("bb")).is_some());
    }

    #[test]
    fn write_failure_keeps_serving_from_memory() {
        let store = Arc::new(MemoryStore::new());
        let cache = TreeCache::new(Arc::clone(&store) as Arc<dyn DocumentStore>, 8);
        store.fail_writes(true);
        assert_eq!(cache.put(&key("hat"), tree(0.6)), PutStatus::WriteFailed);
        assert_eq!(cache.get(&key("hat")), Some(tree(0.6)));
    }

    #[test]
    fn zero_capacity_disables_the_memory_tier() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let cache = TreeCache::new(store, 0);
        cache.put(&key("hat"), tree(0.6));
        assert_eq!(cache.stats().resident, 0);
        // Still served, straight from the document store.
        assert_eq!(cache.get(&key("hat")), Some(tree(0.6)));
    }

    #[test]
    fn categories_do_not_collide() {
        let cache = TreeCache::new(Arc::new(MemoryStore::new()), 8);
        cache.put(&TreeKey::new("hat", Category::PerfectRhyme), tree(0.3));
        cache.put(&TreeKey::new("hat", Category::OneLetterExchanged), tree(0.6));
        assert_eq!(
            cache.get(&TreeKey::new("hat", Category::PerfectRhyme)),
            Some(tree(0.3))
        );
        assert_eq!(
            cache.get(&TreeKey::new("hat", Category::OneLetterExchanged)),
            Some(tree(0.6))
        );
    }
}
