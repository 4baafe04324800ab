//! Key-value storage used to persist visitor identity and variant assignments.
//!
//! Two scopes exist: *durable* storage (survives browser sessions; holds the visitor id and all
//! assignments) and *session* storage (holds the session id). Both are plain string-to-string
//! maps with no structured encoding.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use crate::{Error, Result};

/// Durable key holding the visitor id.
pub const VISITOR_ID_KEY: &str = "pb_visitor_id";
/// Session key holding the session id.
pub const SESSION_ID_KEY: &str = "pb_session_id";

const PAGE_TEST_PREFIX: &str = "pb_ab_variant_";
const BLOCK_TEST_PREFIX: &str = "pb_ab_variant_block_";

/// A string key-value store.
///
/// Implementations only need interior mutability; the engine calls them through shared
/// references.
pub trait Storage {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Storage shared between the identity provider and the variant selector.
pub type SharedStorage = Arc<dyn Storage + Send + Sync>;

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Identifies one selection namespace in durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestKey {
    /// Page-level A/B test, keyed by test id.
    Page(String),
    /// Block-level traffic split, keyed by block id.
    Block(String),
}

impl TestKey {
    /// Storage key under which the assignment is persisted.
    pub fn storage_key(&self) -> String {
        match self {
            TestKey::Page(test_id) => format!("{PAGE_TEST_PREFIX}{test_id}"),
            TestKey::Block(block_id) => format!("{BLOCK_TEST_PREFIX}{block_id}"),
        }
    }
}

impl std::fmt::Display for TestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// In-memory storage that allows concurrent access for readers and writers.
///
/// Suitable as session storage, or as durable storage for a host that keeps one instance alive
/// per visitor.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated with `values`.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        // Err() is possible only if the lock is poisoned (a writer panicked while holding it).
        let values = self.values.read().map_err(|_| Error::StorageUnavailable)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| Error::StorageUnavailable)?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Durable storage persisted as a single JSON object in a file.
///
/// The file is read on open and rewritten on every `set`. A missing file is treated as empty.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl JsonFileStorage {
    /// Open the storage at `path`, loading existing values.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| Error::CorruptedStorage(Arc::new(err)))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| Error::StorageUnavailable)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| Error::StorageUnavailable)?;
        // The new value becomes visible only once it is on disk.
        let mut updated = values.clone();
        updated.insert(key.to_owned(), value.to_owned());
        let bytes = serde_json::to_vec_pretty(&updated)
            .map_err(|err| Error::CorruptedStorage(Arc::new(err)))?;
        fs::write(&self.path, bytes)?;
        *values = updated;
        Ok(())
    }
}
