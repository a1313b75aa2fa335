//! Cache entry with metadata for TTL, LRU and tag tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single cache entry containing the value and its bookkeeping.
///
/// Timestamps are epoch milliseconds from the cache's [`Clock`](crate::Clock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry<T> {
    /// The stored value.
    pub(crate) value: T,

    pub(crate) created_at: i64,

    /// Always strictly after `created_at`.
    pub(crate) expires_at: i64,

    /// Drives LRU ordering.
    pub(crate) last_accessed_at: i64,

    /// Diagnostic only.
    pub(crate) access_count: u64,

    /// Approximate serialized size counted against the byte budget.
    pub(crate) size_bytes: usize,

    /// Labels for bulk invalidation.
    #[serde(default)]
    pub(crate) tags: BTreeSet<String>,
}

impl<T> Entry<T> {
    /// Create an entry living `ttl_ms` from `now`.
    pub fn new(
        value: T,
        now: i64,
        ttl_ms: i64,
        size_bytes: usize,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms.max(1)),
            last_accessed_at: now,
            access_count: 0,
            size_bytes,
            tags: tags.into_iter().collect(),
        }
    }

    /// Check if this entry has expired at a given time.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Record a successful read.
    pub fn touch_at(&mut self, now: i64) {
        self.last_accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Whether this entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Get a reference to the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Milliseconds left before expiry, zero once expired.
    pub fn remaining_ms(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn last_accessed_at(&self) -> i64 {
        self.last_accessed_at
    }
}

/// Read-only view of an entry's metadata, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub key: String,
    pub size_bytes: usize,
    pub access_count: u64,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_accessed_at: i64,
    pub remaining_ms: i64,
    pub tags: Vec<String>,
}

impl EntryInfo {
    pub(crate) fn from_entry<T>(key: &str, entry: &Entry<T>, now: i64) -> Self {
        Self {
            key: key.to_string(),
            size_bytes: entry.size_bytes,
            access_count: entry.access_count,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            last_accessed_at: entry.last_accessed_at,
            remaining_ms: entry.remaining_ms(now),
            tags: entry.tags.iter().cloned().collect(),
        }
    }
}
