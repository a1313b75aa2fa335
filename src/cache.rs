//! The main cache interface.
//!
//! `KeyedCache` wraps the internal storage, the statistics and the
//! persister behind a cheaply cloneable handle.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::durable::{DurableStore, MemoryStore};
use crate::entry::{Entry, EntryInfo};
use crate::error::{CacheError, CacheResult};
use crate::persist::Persister;
use crate::snapshot::{Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::storage::{Lookup, Store};

/// Maximum allowed key length in bytes.
pub const MAX_KEY_LENGTH: usize = 2048;

/// Per-call options for [`KeyedCache::set_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured default TTL.
    pub ttl: Option<Duration>,
    /// Labels for [`KeyedCache::invalidate_by_tag`].
    pub tags: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Approximate stored size of a value: twice its JSON length.
pub fn estimate_size<T: Serialize>(value: &T) -> CacheResult<usize> {
    let json =
        serde_json::to_string(value).map_err(|err| CacheError::InvalidValue(err.to_string()))?;
    Ok(json.len() * 2)
}

/// A size-bounded cache with TTL expiry, LRU eviction, tag invalidation
/// and best-effort persistence.
///
/// Cloning produces a new handle to the same cache.
///
/// ```
/// use festival_cache::{CacheConfig, KeyedCache, SetOptions};
/// use std::time::Duration;
///
/// let cache: KeyedCache<Vec<String>> = KeyedCache::new(CacheConfig::default());
///
/// cache
///     .set_with(
///         "/festivals/genre/techno",
///         vec!["Dekmantel".to_string()],
///         SetOptions::new().ttl(Duration::from_secs(600)).tag("festivals"),
///     )
///     .unwrap();
///
/// assert!(cache.get("/festivals/genre/techno").is_some());
/// cache.invalidate_by_tag("festivals");
/// assert!(cache.get("/festivals/genre/techno").is_none());
/// ```
#[derive(Debug)]
pub struct KeyedCache<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    store: RwLock<Store<T>>,
    config: CacheConfig,
    stats: CacheStats,
    persister: Persister,
    clock: Arc<dyn Clock>,
}

impl<T> Clone for KeyedCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> KeyedCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a cache whose snapshots live only in process memory.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Create a cache persisted to `durable`, rehydrating from it.
    pub fn with_store(config: CacheConfig, durable: Arc<dyn DurableStore>) -> Self {
        Self::with_store_and_clock(config, durable, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_store_and_clock(
        config: CacheConfig,
        durable: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persister = Persister::new(durable, config.storage_key.clone());
        let cache = Self {
            inner: Arc::new(Inner {
                store: RwLock::new(Store::new(config.max_size_bytes, config.max_entries)),
                stats: CacheStats::new(config.latency_window),
                config,
                persister,
                clock,
            }),
        };
        cache.rehydrate();
        cache
    }

    /// Get a value from the cache.
    ///
    /// Returns `None` if the key was never set, has expired, or was evicted
    /// or invalidated. A hit refreshes the entry's LRU position.
    pub fn get(&self, key: &str) -> Option<T> {
        let started = Instant::now();
        let now = self.now();

        let value = {
            let mut store = self.write_store();
            match store.get(key, now) {
                Lookup::Hit(value) => Some(value.clone()),
                Lookup::Expired => {
                    self.inner.stats.record_expirations(1);
                    None
                }
                Lookup::Missing => None,
            }
        };

        match value {
            Some(_) => self.inner.stats.record_hit(),
            None => self.inner.stats.record_miss(),
        }
        self.inner.stats.record_latency(started.elapsed());
        value
    }

    /// Store `value` under `key` with the default TTL and no tags.
    pub fn set(&self, key: impl Into<String>, value: T) -> CacheResult<()> {
        self.set_with(key, value, SetOptions::default())
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// Fails only on programmer errors: an empty or oversized key, a zero
    /// TTL, or a value that cannot be serialized. Other entries may be
    /// evicted to stay within capacity; an entry larger than the whole
    /// byte budget is dropped.
    pub fn set_with(
        &self,
        key: impl Into<String>,
        value: T,
        options: SetOptions,
    ) -> CacheResult<()> {
        let key = key.into();
        let entry = self.build_entry(&key, value, options)?;
        {
            let mut store = self.write_store();
            self.insert_locked(&mut store, key, entry);
        }
        self.persist_changed();
        Ok(())
    }

    /// Store `value` only if no live entry exists for `key`.
    ///
    /// Returns whether the value was stored.
    pub fn insert_if_absent(
        &self,
        key: impl Into<String>,
        value: T,
        options: SetOptions,
    ) -> CacheResult<bool> {
        let key = key.into();
        let entry = self.build_entry(&key, value, options)?;
        let stored = {
            let mut store = self.write_store();
            if store.contains(&key, self.now()) {
                false
            } else {
                self.insert_locked(&mut store, key, entry)
            }
        };
        if stored {
            self.persist_changed();
        }
        Ok(stored)
    }

    /// Whether a live entry exists. Does not touch LRU order or statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.read_store().contains(key, self.now())
    }

    /// Remove a single key. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        let existed = self.write_store().remove(key).is_some();
        if existed {
            self.persist_changed();
        }
        existed
    }

    /// Remove every entry tagged with `tag`. Returns the number removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let removed = self.write_store().remove_tagged(tag);
        debug!(tag, removed, "invalidated cache entries by tag");
        self.persist_changed();
        removed
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.write_store().remove_expired(self.now());
        if removed > 0 {
            self.inner.stats.record_expirations(removed);
            debug!(removed, "swept expired cache entries");
            self.persist_changed();
        }
        removed
    }

    /// Empty the cache and the durable store, and reset statistics.
    pub fn clear(&self) {
        self.write_store().clear();
        self.inner.stats.reset();
        self.inner.persister.remove();
    }

    /// Get a snapshot of the cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        let (entry_count, total_size) = {
            let store = self.read_store();
            (store.len(), store.total_size())
        };
        self.inner.stats.snapshot(entry_count, total_size)
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.read_store().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Metadata for every entry, least recently used first.
    pub fn entries_info(&self) -> Vec<EntryInfo> {
        let now = self.now();
        self.read_store()
            .iter()
            .map(|(key, entry)| EntryInfo::from_entry(key, entry, now))
            .collect()
    }

    /// Write the current state to the durable store now.
    ///
    /// Failures are logged, never returned.
    pub fn flush(&self) {
        let snapshot = {
            let store = self.read_store();
            Snapshot {
                version: SNAPSHOT_VERSION,
                saved_at: self.now(),
                entries: store
                    .iter()
                    .map(|(key, entry)| SnapshotEntry {
                        key: key.clone(),
                        entry: entry.clone(),
                    })
                    .collect(),
                stats: self.inner.stats.persisted(),
            }
        };

        match snapshot.encode() {
            Ok(payload) => self.inner.persister.write(&payload),
            Err(err) => warn!(error = %err, "failed to encode cache snapshot"),
        }
    }

    /// Whether snapshots are still reaching the durable store.
    pub fn is_persistent(&self) -> bool {
        self.inner.persister.is_available()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Flush if a debounced write is pending.
    pub(crate) fn flush_if_dirty(&self) {
        if self.inner.persister.take_dirty() {
            self.flush();
        }
    }

    pub(crate) fn attach_flusher(&self, attached: bool) {
        self.inner.persister.attach_flusher(attached);
    }

    /// Wait until a mutation marks the cache dirty.
    pub(crate) async fn dirtied(&self) {
        self.inner.persister.dirtied().await;
    }

    fn build_entry(&self, key: &str, value: T, options: SetOptions) -> CacheResult<Entry<T>> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key is {} bytes (max: {})",
                key.len(),
                MAX_KEY_LENGTH
            )));
        }

        let ttl = options.ttl.unwrap_or(self.inner.config.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let size = estimate_size(&value)?;
        Ok(Entry::new(value, self.now(), ttl_ms, size, options.tags))
    }

    /// Insert under an already held lock. Returns whether the entry was kept.
    fn insert_locked(&self, store: &mut Store<T>, key: String, entry: Entry<T>) -> bool {
        let size = entry.size_bytes();
        let outcome = store.insert(key.clone(), entry);

        if outcome.evicted > 0 {
            self.inner.stats.record_evictions(outcome.evicted);
            debug!(key = %key, evicted = outcome.evicted, "evicted entries to make room");
        }
        if outcome.stored {
            self.inner.stats.record_set();
        } else {
            debug!(
                key = %key,
                size,
                replaced = outcome.replaced,
                "entry larger than cache capacity, dropped"
            );
        }
        outcome.stored
    }

    fn persist_changed(&self) {
        // Without a running flusher, debounced writes would never happen.
        if self.inner.config.flush_debounce.is_some() && self.inner.persister.has_flusher() {
            self.inner.persister.mark_dirty();
        } else {
            self.flush();
        }
    }

    fn rehydrate(&self) {
        let Some(snapshot) = self.inner.persister.load::<T>() else {
            return;
        };

        let now = self.now();
        let total = snapshot.entries.len();
        let mut restored = 0;
        {
            let mut store = self.write_store();
            for SnapshotEntry { key, mut entry } in snapshot.entries {
                if entry.is_expired_at(now) || key.is_empty() || key.len() > MAX_KEY_LENGTH {
                    continue;
                }
                // Stored sizes are not trusted; the budget only counts our own estimate.
                match estimate_size(&entry.value) {
                    Ok(size) => entry.size_bytes = size,
                    Err(err) => {
                        warn!(key = %key, error = %err, "skipping unsizable snapshot entry");
                        continue;
                    }
                }
                if store.insert(key, entry).stored {
                    restored += 1;
                }
            }
            // Capacity may have shrunk since the snapshot was taken.
            restored = restored.min(store.len());
        }
        self.inner.stats.restore(&snapshot.stats);

        info!(restored, dropped = total - restored, "rehydrated cache from durable store");
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Store<T>> {
        self.inner.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, Store<T>> {
        self.inner.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for KeyedCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
