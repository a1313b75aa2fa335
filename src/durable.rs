//! Durable key-value backends the cache snapshots itself into.
//!
//! The contract mirrors origin-scoped browser storage: a synchronous
//! string-to-string map with a size quota. Every call may fail; the cache
//! treats the store as an optimization and never lets these errors reach
//! its own callers.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{CacheError, CacheResult};

/// A synchronous, string-to-string persistent store.
pub trait DurableStore: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`.
    fn get_item(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> CacheResult<()>;
}

/// In-process store, optionally bounded by a quota.
///
/// Usage is counted as the byte length of every key plus its value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes pushing usage past `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Bytes currently used.
    pub fn usage(&self) -> usize {
        self.items
            .read()
            .map(|items| items.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }

    fn poisoned() -> CacheError {
        CacheError::StorageUnavailable("memory store lock poisoned".to_string())
    }
}

impl DurableStore for MemoryStore {
    fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;

        if let Some(limit) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(CacheError::QuotaExceeded { needed, limit });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CacheResult<()> {
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.remove(key);
        Ok(())
    }
}

/// Directory-backed store with one file per key.
///
/// Keys are hex-encoded into file names so any string is a valid key.
/// Writes go to a temporary file that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> CacheResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| {
            CacheError::StorageUnavailable(format!("cannot create {}: {}", dir.display(), err))
        })?;
        Ok(Self { dir, quota: None })
    }

    /// Use a store rooted at `dir` without creating it.
    ///
    /// A missing directory reads as empty; writes to it fail with
    /// `StorageUnavailable`.
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            quota: None,
        }
    }

    /// Bound the size of any single stored value.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key.bytes().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.json", name))
    }

    fn classify(&self, err: io::Error) -> CacheError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                CacheError::StorageUnavailable(format!("{}: {}", self.dir.display(), err))
            }
            _ => CacheError::Io(err),
        }
    }
}

impl DurableStore for FileStore {
    fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.classify(err)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> CacheResult<()> {
        if let Some(limit) = self.quota {
            let needed = key.len() + value.len();
            if needed > limit {
                return Err(CacheError::QuotaExceeded { needed, limit });
            }
        }

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|err| self.classify(err))?;
        fs::rename(&tmp, &path).map_err(|err| self.classify(err))
    }

    fn remove_item(&self, key: &str) -> CacheResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.classify(err)),
        }
    }
}

/// A store that is never available. Forces memory-only operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl DurableStore for UnavailableStore {
    fn get_item(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::StorageUnavailable("no durable store".to_string()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> CacheResult<()> {
        Err(CacheError::StorageUnavailable("no durable store".to_string()))
    }

    fn remove_item(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::StorageUnavailable("no durable store".to_string()))
    }
}
