//! Background maintenance tasks.
//!
//! Two optional Tokio tasks keep a cache healthy without caller
//! involvement: a periodic sweep that reclaims expired entries, and a
//! debounced flusher that turns bursts of mutations into a single
//! snapshot write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cache::KeyedCache;
use crate::error::{CacheError, CacheResult};

/// Handles to the tasks started by [`spawn_background`].
///
/// Dropping this, or calling [`BackgroundTasks::shutdown`], aborts the
/// tasks and writes any pending snapshot. The cache then goes back to
/// writing after every mutation.
#[derive(Debug)]
pub struct BackgroundTasks<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    cache: KeyedCache<T>,
    handles: Vec<JoinHandle<()>>,
    flusher: bool,
}

impl<T> BackgroundTasks<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Number of running tasks.
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop all tasks and flush pending changes.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        if self.flusher {
            self.cache.attach_flusher(false);
            self.cache.flush_if_dirty();
        }
    }
}

impl<T> Drop for BackgroundTasks<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the sweep and flush tasks the cache's config asks for.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_background<T>(cache: &KeyedCache<T>) -> CacheResult<BackgroundTasks<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let runtime =
        Handle::try_current().map_err(|err| CacheError::RuntimeUnavailable(err.to_string()))?;

    let config = cache.config();
    let mut handles = Vec::new();

    if config.background_cleanup {
        handles.push(runtime.spawn(sweep_expired(cache.clone(), config.cleanup_interval)));
    }
    let flusher = config.flush_debounce.is_some();
    if let Some(debounce) = config.flush_debounce {
        cache.attach_flusher(true);
        handles.push(runtime.spawn(flush_debounced(cache.clone(), debounce)));
    }

    Ok(BackgroundTasks {
        cache: cache.clone(),
        handles,
        flusher,
    })
}

async fn sweep_expired<T>(cache: KeyedCache<T>, interval: Duration)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = cache.cleanup_expired();
        debug!(removed, "periodic expiry sweep finished");
    }
}

async fn flush_debounced<T>(cache: KeyedCache<T>, debounce: Duration)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    loop {
        cache.dirtied().await;
        tokio::time::sleep(debounce).await;
        cache.flush_if_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::durable::{DurableStore, MemoryStore};
    use crate::SetOptions;
    use std::sync::Arc;

    #[test]
    fn test_requires_runtime() {
        let cache: KeyedCache<u32> = KeyedCache::default();
        assert!(matches!(
            spawn_background(&cache),
            Err(CacheError::RuntimeUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_nothing_spawned_by_default() {
        let cache: KeyedCache<u32> = KeyedCache::default();
        let tasks = spawn_background(&cache).unwrap();
        assert_eq!(tasks.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_flush() {
        let durable = Arc::new(MemoryStore::new());
        let config = CacheConfig::new()
            .flush_debounce(Duration::from_millis(100))
            .build();
        let cache: KeyedCache<u32> = KeyedCache::with_store(config, durable.clone());
        let tasks = spawn_background(&cache).unwrap();

        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(durable.get_item("app_cache_v1").unwrap(), None);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let raw = durable.get_item("app_cache_v1").unwrap().unwrap();
        assert!(raw.contains("\"a\""));
        assert!(raw.contains("\"b\""));

        tasks.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_changes() {
        let durable = Arc::new(MemoryStore::new());
        let config = CacheConfig::new()
            .flush_debounce(Duration::from_secs(60))
            .build();
        let cache: KeyedCache<u32> = KeyedCache::with_store(config, durable.clone());
        let tasks = spawn_background(&cache).unwrap();

        cache.set("a", 1).unwrap();
        assert_eq!(durable.get_item("app_cache_v1").unwrap(), None);
        tasks.shutdown();

        assert!(durable.get_item("app_cache_v1").unwrap().is_some());

        // With the flusher gone, writes are synchronous again.
        cache.set("b", 2).unwrap();
        let raw = durable.get_item("app_cache_v1").unwrap().unwrap();
        assert!(raw.contains("\"b\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig::new()
            .background_cleanup(true)
            .cleanup_interval(Duration::from_secs(1))
            .build();
        let cache: KeyedCache<u32> =
            KeyedCache::with_store_and_clock(config, Arc::new(MemoryStore::new()), clock.clone());
        let tasks = spawn_background(&cache).unwrap();
        assert_eq!(tasks.task_count(), 1);

        cache
            .set_with("a", 1, SetOptions::new().ttl(Duration::from_millis(10)))
            .unwrap();
        clock.advance(10);
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(cache.len(), 0);

        tasks.shutdown();
    }
}
