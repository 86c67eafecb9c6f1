//! The async scoring service.
//!
//! Request path for a (start word, category) tree:
//!
//! 1) cache lookup (memory, then document store);
//! 2) single-flight registry — at most one build per key runs at a time,
//!    concurrent requesters subscribe to the in-flight result;
//! 3) build under a global semaphore bounding concurrent builds, since each
//!    build is a run of model calls;
//! 4) cache + persist, then broadcast the outcome to every subscriber.
//!
//! Build failures are broadcast too (every waiter gets the same typed error)
//! but never negatively cached: the next request after a failure starts a
//! fresh build. A dropped builder (caller went away mid-build) wakes the
//! waiters, which re-enter the path from the top; one of them becomes the
//! new builder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Semaphore};

use crate::builder::TreeBuilder;
use crate::cache::{CacheStats, TreeCache};
use crate::errors::{BuildError, ScoreError, ServiceError};
use crate::lexicon::CandidateSource;
use crate::model::LanguageModel;
use crate::prompt::base_context;
use crate::scoring;
use crate::store::DocumentStore;
use crate::token::Tokenizer;
use crate::tree::WordProbabilityTree;
use crate::types::{Candidate, Category, PlayScore, TreeKey};

/// Knobs of the scoring service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Concurrent tree builds across all keys (min 1).
    pub max_concurrent_builds: usize,
    /// Per-model-call timeout; an expired call fails the build as
    /// model-unavailable.
    pub model_timeout: Duration,
    /// Memory-tier capacity of the tree cache.
    pub cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            max_concurrent_builds: 4,
            model_timeout: Duration::from_secs(30),
            cache_capacity: 256,
        }
    }
}

type BuildResult = Result<Arc<WordProbabilityTree>, BuildError>;
type InFlightMap = HashMap<TreeKey, watch::Receiver<Option<BuildResult>>>;

/// Removes the key from the in-flight registry when the builder finishes or
/// is dropped mid-build, so waiters never hang on an abandoned entry.
struct InFlightGuard<'a> {
    registry: &'a Mutex<InFlightMap>,
    key: &'a TreeKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

pub struct ScoringService<M, T, L>
where
    M: LanguageModel,
    T: Tokenizer,
    L: CandidateSource,
{
    model: M,
    tokenizer: T,
    lexicon: L,
    cache: TreeCache,
    build_permits: Semaphore,
    in_flight: Mutex<InFlightMap>,
    model_timeout: Duration,
}

impl<M, T, L> ScoringService<M, T, L>
where
    M: LanguageModel,
    T: Tokenizer,
    L: CandidateSource,
{
    pub fn new(
        model: M,
        tokenizer: T,
        lexicon: L,
        store: Arc<dyn DocumentStore>,
        config: ServiceConfig,
    ) -> Self {
        ScoringService {
            model,
            tokenizer,
            lexicon,
            cache: TreeCache::new(store, config.cache_capacity),
            build_permits: Semaphore::new(config.max_concurrent_builds.max(1)),
            in_flight: Mutex::new(HashMap::new()),
            model_timeout: config.model_timeout,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Score `played_word` against the (start word, category) tree, building
    /// it on first use.
    pub async fn score(
        &self,
        start_word: &str,
        category: Category,
        played_word: &str,
    ) -> Result<PlayScore, ServiceError> {
        let key = TreeKey::new(start_word, category);
        let tree = self.obtain(&key).await?;
        let played = played_word.trim().to_lowercase();
        let tokens = self.tokenizer.encode(&played)?;
        let candidate = Candidate::new(played, tokens, category);
        Ok(scoring::play_score(&tree, &candidate)?)
    }

    /// The category tree for a start word, building it on first use.
    pub async fn tree(
        &self,
        start_word: &str,
        category: Category,
    ) -> Result<Arc<WordProbabilityTree>, ServiceError> {
        let key = TreeKey::new(start_word, category);
        Ok(self.obtain(&key).await?)
    }

    /// Cache-only lookup; never builds.
    pub fn cached_tree(
        &self,
        start_word: &str,
        category: Category,
    ) -> Result<Arc<WordProbabilityTree>, ScoreError> {
        let key = TreeKey::new(start_word, category);
        self.cache.get(&key).ok_or_else(|| ScoreError::TreeNotBuilt {
            word: key.word,
            category,
        })
    }

    /// Build (or load) all seven category trees for a start word, one
    /// category at a time, continuing past per-category failures.
    pub async fn prepare_word(
        &self,
        start_word: &str,
    ) -> Vec<(Category, Result<Arc<WordProbabilityTree>, ServiceError>)> {
        let mut outcomes = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let outcome = self.tree(start_word, category).await;
            if let Err(err) = &outcome {
                log::warn!("preparing {start_word}/{category} failed: {err}");
            }
            outcomes.push((category, outcome));
        }
        outcomes
    }

    /// Cache hit, or single-flight build.
    async fn obtain(&self, key: &TreeKey) -> Result<Arc<WordProbabilityTree>, BuildError> {
        loop {
            if let Some(tree) = self.cache.get(key) {
                return Ok(tree);
            }

            enum Role {
                Build(watch::Sender<Option<BuildResult>>),
                Wait(watch::Receiver<Option<BuildResult>>),
            }

            let role = {
                let mut in_flight = self.lock_in_flight();
                match in_flight.get(key) {
                    Some(rx) => Role::Wait(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(key.clone(), rx);
                        Role::Build(tx)
                    }
                }
            };

            match role {
                Role::Build(tx) => {
                    let guard = InFlightGuard {
                        registry: &self.in_flight,
                        key,
                    };
                    let result = self.run_build(key).await;
                    // Publish before deregistering: a waiter holding the
                    // registry's receiver must see the value, not a closed
                    // channel.
                    let _ = tx.send(Some(result.clone()));
                    drop(guard);
                    return result;
                }
                Role::Wait(mut rx) => {
                    let published = rx.borrow_and_update().clone();
                    if let Some(result) = published {
                        return result;
                    }
                    match rx.changed().await {
                        Ok(()) => {
                            let published = rx.borrow_and_update().clone();
                            if let Some(result) = published {
                                return result;
                            }
                            // No value despite the wake: retry from the top.
                        }
                        Err(_) => {
                            // Builder dropped mid-build. Retry; the cache may
                            // already hold the tree, otherwise someone (maybe
                            // us) becomes the new builder.
                        }
                    }
                }
            }
        }
    }

    async fn run_build(&self, key: &TreeKey) -> BuildResult {
        let _permit = self
            .build_permits
            .acquire()
            .await
            .map_err(|_| BuildError::ModelUnavailable("build queue closed".to_string()))?;

        let words = self
            .lexicon
            .candidates(&key.word, key.category)
            .map_err(|e| BuildError::CandidateSource(e.to_string()))?;
        let frequency = self.lexicon.frequency(&key.word);

        if words.is_empty() {
            // No candidates for this category: the explicit empty tree,
            // cached and persisted like any other, with zero model calls.
            let tree = Arc::new(WordProbabilityTree::empty(frequency));
            self.cache.put(key, Arc::clone(&tree));
            return Ok(tree);
        }

        let base = base_context(&self.tokenizer, &key.word, key.category)
            .map_err(|source| BuildError::ContextEncoding {
                word: key.word.clone(),
                source,
            })?;

        let mut candidates = Vec::with_capacity(words.len());
        for word in words {
            match self.tokenizer.encode(&word) {
                Ok(tokens) => candidates.push(Candidate::new(word, tokens, key.category)),
                Err(err) => {
                    log::debug!("skipping candidate {word:?} for {key}: {err}");
                }
            }
        }

        let builder = TreeBuilder::new(&self.model, self.model_timeout);
        let outcome = builder.build(&base, &candidates, frequency).await?;
        log::debug!(
            "built {key}: {} sequences, {} nodes, {} model calls, {} pruned",
            outcome.tree.valid_sequences.len(),
            outcome.tree.node_count(),
            outcome.model_calls,
            outcome.pruned_sequences
        );

        let tree = Arc::new(outcome.tree);
        self.cache.put(key, Arc::clone(&tree));
        Ok(tree)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, InFlightMap> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
