//! # Festival Cache
//!
//! A size-bounded, thread-safe cache for JSON-serializable values, with
//! best-effort persistence and route-driven prefetching.
//!
//! ## Features
//!
//! - **TTL support**: Every entry expires; reads at or past the deadline miss
//! - **LRU eviction**: A byte budget (and optional entry bound) evicts the
//!   least-recently-used entries first
//! - **Tags**: Entries carry labels and can be invalidated as a group
//! - **Persistence**: Snapshots go to a [`DurableStore`]; failures never
//!   reach the caller
//! - **Statistics**: Hits, misses, evictions and a rolling read latency
//! - **Prefetching**: [`PrefetchAdvisor`] warms the cache with the routes a
//!   visitor is likely to open next
//!
//! ## Quick Start
//!
//! ```rust
//! use festival_cache::{CacheConfig, KeyedCache, SetOptions};
//! use std::time::Duration;
//!
//! let config = CacheConfig::new()
//!     .max_size_bytes(1024 * 1024)
//!     .default_ttl(Duration::from_secs(300))
//!     .build();
//!
//! let cache: KeyedCache<String> = KeyedCache::new(config);
//!
//! cache.set("/quiz", "quiz page".to_string()).unwrap();
//! assert_eq!(cache.get("/quiz"), Some("quiz page".to_string()));
//!
//! cache
//!     .set_with(
//!         "/blog/lineups",
//!         "lineup post".to_string(),
//!         SetOptions::new().ttl(Duration::from_secs(60)).tag("blog"),
//!     )
//!     .unwrap();
//! assert_eq!(cache.invalidate_by_tag("blog"), 1);
//!
//! let stats = cache.stats();
//! println!("Hit rate: {:.1}%", stats.hit_rate);
//! ```
//!
//! ## Thread Safety
//!
//! Cloning a `KeyedCache` creates a new handle to the same underlying data:
//!
//! ```rust
//! use festival_cache::KeyedCache;
//! use std::thread;
//!
//! let cache: KeyedCache<String> = KeyedCache::default();
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let cache = cache.clone();
//!     thread::spawn(move || {
//!         cache.set(format!("key_{}", i), format!("value_{}", i)).unwrap();
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(), 4);
//! ```

pub mod background;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod durable;
pub mod entry;
pub mod error;
pub mod prefetch;
pub mod routes;
pub mod snapshot;
pub mod stats;

pub use background::{spawn_background, BackgroundTasks};
pub use cache::{estimate_size, KeyedCache, SetOptions, MAX_KEY_LENGTH};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, PrefetchConfig, DEFAULT_STORAGE_KEY};
pub use durable::{DurableStore, FileStore, MemoryStore, UnavailableStore};
pub use entry::{Entry, EntryInfo};
pub use error::{CacheError, CacheResult, FetchError};
pub use prefetch::{
    AnalyticsSink, Fetcher, NoopAnalytics, PrefetchAdvisor, PrefetchState, PrefetchStats,
    Priority, TracingAnalytics,
};
pub use routes::{normalize_path, RouteRules};
pub use snapshot::{Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
pub use stats::{CacheStats, PersistedStats, StatsSnapshot};

// Internal modules - not part of public API
pub(crate) mod persist;
pub(crate) mod storage;
