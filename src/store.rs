//! Word-document persistence.
//!
//! One JSON document per key (`word:<start word>`), fields addressed by
//! dotted path (`olo.olx`, `rhy.prf`). The contract is three operations:
//! read a field, write a field, merge a patch document. Merge is recursive
//! on objects and replace on everything else, so one category's artifact can
//! be updated without touching its siblings.
//!
//! [`FsDocumentStore`] keeps one file per key and writes through a named
//! temp file in the same directory, renamed over the target on success, so
//! a crash mid-write never leaves a half-written document. Read-modify-write
//! is not guarded across processes: the store assumes a single writing
//! process per data directory.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::errors::StoreError;

/// Storage key of one start word's document.
pub fn word_key(word: &str) -> String {
    format!("word:{}", word.trim().to_lowercase())
}

/// Read the value at a dotted `path` inside `doc`.
pub fn value_at<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted `path`, creating intermediate objects and
/// replacing any non-object value standing where an intermediate belongs.
pub fn set_at(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut rest = path;
    while let Some((head, tail)) = rest.split_once('.') {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        current = map.entry(head.to_string()).or_insert(Value::Null);
        rest = tail;
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(rest.to_string(), value);
    }
}

/// Recursively merge `patch` into `doc`: objects merge key by key,
/// everything else (arrays included) replaces wholesale.
pub fn deep_merge(doc: &mut Value, patch: &Value) {
    match (doc, patch) {
        (Value::Object(doc_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                deep_merge(
                    doc_map.entry(key.clone()).or_insert(Value::Null),
                    patch_value,
                );
            }
        }
        (slot, patch_value) => *slot = patch_value.clone(),
    }
}

/// The persistence seam of the scoring pipeline.
pub trait DocumentStore: Send + Sync {
    /// Whole document at `key`; `None` when the key has never been written.
    fn document(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write the field at dotted `path`, creating the document if needed.
    fn set(&self, key: &str, path: &str, value: Value) -> Result<(), StoreError>;

    /// Recursively merge `patch` into the document at `key`.
    fn merge(&self, key: &str, patch: &Value) -> Result<(), StoreError>;

    /// Field at dotted `path` inside the document at `key`.
    fn get(&self, key: &str, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .document(key)?
            .and_then(|doc| value_at(&doc, path).cloned()))
    }
}

/// One JSON file per key under a data directory.
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    /// Opens (and creates if missing) the data directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FsDocumentStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys map to filenames with anything outside `[A-Za-z0-9._-]`
    /// replaced by `_` (the `word:` prefix becomes `word_`).
    fn key_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn read_document(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let bytes = match fs::read(self.key_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write_document(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        let temp = NamedTempFile::new_in(&self.dir)?;
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, doc)?;
        writer.flush()?;
        drop(writer);
        temp.persist(self.key_path(key))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl DocumentStore for FsDocumentStore {
    fn document(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.read_document(key)
    }

    fn set(&self, key: &str, path: &str, value: Value) -> Result<(), StoreError> {
        let mut doc = self
            .read_document(key)?
            .unwrap_or_else(|| Value::Object(Map::new()));
        set_at(&mut doc, path, value);
        self.write_document(key, &doc)
    }

    fn merge(&self, key: &str, patch: &Value) -> Result<(), StoreError> {
        let mut doc = self
            .read_document(key)?
            .unwrap_or_else(|| Value::Object(Map::new()));
        deep_merge(&mut doc, patch);
        self.write_document(key, &doc)
    }
}

/// In-memory store for tests and ephemeral runs.
///
/// `fail_writes(true)` makes every mutation return an I/O error, to exercise
/// the write-failure path (scores must still be served from memory).
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("writes disabled")));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn document(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut documents = self.lock();
        let doc = documents
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set_at(doc, path, value);
        Ok(())
    }

    fn merge(&self, key: &str, patch: &Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut documents = self.lock();
        let doc = documents
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        deep_merge(doc, patch);
        Ok(())
    }
}
