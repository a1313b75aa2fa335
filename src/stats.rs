//! Statistics and metrics for the cache.
//!
//! Counters are atomic so they can be bumped without holding the entry
//! lock. Read latency is tracked over a fixed window of the most recent
//! `get` calls rather than the cache lifetime.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Statistics for cache operations.
#[derive(Debug)]
pub struct CacheStats {
    /// Number of `get` calls that returned a value.
    hits: AtomicU64,

    /// Number of `get` calls that found nothing (absent, expired or evicted).
    misses: AtomicU64,

    /// Number of entries evicted due to capacity limits.
    evictions: AtomicU64,

    /// Number of entries removed due to TTL expiration.
    expirations: AtomicU64,

    /// Total number of accepted set operations.
    sets: AtomicU64,

    /// Recent read latencies in milliseconds.
    latencies: Mutex<VecDeque<f64>>,

    window: usize,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CacheStats {
    /// Create a new stats instance averaging latency over `window` reads.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a `get` took.
    pub fn record_latency(&self, elapsed: Duration) {
        if let Ok(mut latencies) = self.latencies.lock() {
            if latencies.len() == self.window {
                latencies.pop_front();
            }
            latencies.push_back(elapsed.as_secs_f64() * 1_000.0);
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no reads have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Average latency of the reads in the current window.
    pub fn average_latency_ms(&self) -> f64 {
        match self.latencies.lock() {
            Ok(latencies) if !latencies.is_empty() => {
                latencies.iter().sum::<f64>() / latencies.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Reset every counter and the latency window.
    pub fn reset(&self) {
        self.restore(&PersistedStats::default());
        if let Ok(mut latencies) = self.latencies.lock() {
            latencies.clear();
        }
    }

    /// Counters in their persisted form.
    pub fn persisted(&self) -> PersistedStats {
        PersistedStats {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            sets: self.sets(),
        }
    }

    /// Overwrite the counters with previously persisted values.
    pub fn restore(&self, saved: &PersistedStats) {
        self.hits.store(saved.hits, Ordering::Relaxed);
        self.misses.store(saved.misses, Ordering::Relaxed);
        self.evictions.store(saved.evictions, Ordering::Relaxed);
        self.expirations.store(saved.expirations, Ordering::Relaxed);
        self.sets.store(saved.sets, Ordering::Relaxed);
    }

    /// Create a snapshot combining the counters with the store's size.
    pub fn snapshot(&self, entry_count: usize, total_size_bytes: usize) -> StatsSnapshot {
        let hit_rate = self.hit_rate();
        StatsSnapshot {
            entry_count,
            total_size_bytes,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            sets: self.sets(),
            hit_rate,
            miss_rate: 100.0 - hit_rate,
            average_access_latency_ms: self.average_latency_ms(),
        }
    }
}

/// Lifetime counters as written into the durable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub sets: u64,
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub entry_count: usize,
    pub total_size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub sets: u64,
    /// Percentage of lifetime reads that hit.
    pub hit_rate: f64,
    /// Always `100 - hit_rate`.
    pub miss_rate: f64,
    pub average_access_latency_ms: f64,
}
