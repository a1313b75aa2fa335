//! Configuration for the cache and the prefetch advisor.
//!
//! Both configs use a consuming builder: start from `new()`, chain setters,
//! finish with `build()`.

use std::time::Duration;

/// Default key the snapshot is stored under in the durable store.
pub const DEFAULT_STORAGE_KEY: &str = "app_cache_v1";

/// Configuration for creating a new cache instance.
///
/// ```
/// use festival_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .max_size_bytes(1024 * 1024)
///     .default_ttl(Duration::from_secs(300))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget for the sum of all entry sizes. `None` means unlimited.
    pub(crate) max_size_bytes: Option<usize>,

    /// Optional bound on the number of entries. `None` means unlimited.
    pub(crate) max_entries: Option<usize>,

    /// TTL used when `set` is called without one.
    pub(crate) default_ttl: Duration,

    /// Interval for the background sweep of expired entries.
    pub(crate) cleanup_interval: Duration,

    /// Whether `spawn_background` starts the sweep task.
    pub(crate) background_cleanup: bool,

    /// Key the snapshot is stored under.
    pub(crate) storage_key: String,

    /// `None` flushes after every mutation; `Some(d)` defers to the
    /// background flusher, which writes at most once per `d`. Until
    /// `spawn_background` starts that flusher, writes stay synchronous.
    pub(crate) flush_debounce: Option<Duration>,

    /// Number of recent `get` calls the latency average covers.
    pub(crate) latency_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: Some(5 * 1024 * 1024),
            max_entries: None,
            default_ttl: Duration::from_secs(60 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            background_cleanup: false,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            flush_debounce: None,
            latency_window: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the byte budget. Use 0 for unlimited.
    pub fn max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = if bytes == 0 { None } else { Some(bytes) };
        self
    }

    /// Set the maximum number of entries. Use 0 for unlimited.
    pub fn max_entries(mut self, entries: usize) -> Self {
        self.max_entries = if entries == 0 { None } else { Some(entries) };
        self
    }

    /// Set the default TTL. A zero duration keeps the previous value.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.default_ttl = ttl;
        }
        self
    }

    /// Set the interval for the background expiry sweep.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.cleanup_interval = interval;
        }
        self
    }

    /// Enable or disable the background expiry sweep.
    pub fn background_cleanup(mut self, enabled: bool) -> Self {
        self.background_cleanup = enabled;
        self
    }

    /// Set the key the snapshot is stored under.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Debounce snapshot writes. `Duration::ZERO` restores synchronous flushing.
    ///
    /// Takes effect once [`spawn_background`](crate::spawn_background) is
    /// running the flusher; before that, and after it shuts down, every
    /// mutation is still written immediately.
    pub fn flush_debounce(mut self, debounce: Duration) -> Self {
        self.flush_debounce = if debounce.is_zero() {
            None
        } else {
            Some(debounce)
        };
        self
    }

    /// Set how many recent reads the latency average covers (at least 1).
    pub fn latency_window(mut self, samples: usize) -> Self {
        self.latency_window = samples.max(1);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Get the byte budget, if set.
    pub fn get_max_size_bytes(&self) -> Option<usize> {
        self.max_size_bytes
    }

    /// Get the entry bound, if set.
    pub fn get_max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    /// Get the default TTL.
    pub fn get_default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get the storage key.
    pub fn get_storage_key(&self) -> &str {
        &self.storage_key
    }
}

/// Configuration for [`PrefetchAdvisor`](crate::PrefetchAdvisor).
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    pub(crate) high_delay: Duration,
    pub(crate) normal_delay: Duration,
    pub(crate) low_delay: Duration,
    /// TTL for prefetched entries; `None` uses the cache default.
    pub(crate) prefetch_ttl: Option<Duration>,
    /// Tag attached to every prefetched entry.
    pub(crate) prefetch_tag: String,
    /// Upper bound on queued plus in-flight prefetches.
    pub(crate) max_pending: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            high_delay: Duration::ZERO,
            normal_delay: Duration::from_millis(200),
            low_delay: Duration::from_secs(2),
            prefetch_ttl: None,
            prefetch_tag: "prefetch".to_string(),
            max_pending: 32,
        }
    }
}

impl PrefetchConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before a `high` priority prefetch starts.
    pub fn high_delay(mut self, delay: Duration) -> Self {
        self.high_delay = delay;
        self
    }

    /// Delay before a `normal` priority prefetch starts.
    pub fn normal_delay(mut self, delay: Duration) -> Self {
        self.normal_delay = delay;
        self
    }

    /// Delay before a `low` priority prefetch starts.
    pub fn low_delay(mut self, delay: Duration) -> Self {
        self.low_delay = delay;
        self
    }

    /// TTL for prefetched entries.
    pub fn prefetch_ttl(mut self, ttl: Duration) -> Self {
        self.prefetch_ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Tag attached to prefetched entries.
    pub fn prefetch_tag(mut self, tag: impl Into<String>) -> Self {
        self.prefetch_tag = tag.into();
        self
    }

    /// Maximum number of queued or in-flight prefetches (at least 1).
    pub fn max_pending(mut self, max: usize) -> Self {
        self.max_pending = max.max(1);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }
}
