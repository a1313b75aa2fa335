//! Serialized form of the cache written to the durable store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::CacheResult;
use crate::stats::PersistedStats;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry<T> {
    pub key: String,
    #[serde(flatten)]
    pub entry: Entry<T>,
}

/// The whole cache, least recently used entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    pub version: u32,
    pub saved_at: i64,
    pub entries: Vec<SnapshotEntry<T>>,
    #[serde(default)]
    pub stats: PersistedStats,
}

impl<T: Serialize> Snapshot<T> {
    pub fn encode(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<T: DeserializeOwned> Snapshot<T> {
    /// Parse a snapshot. Returns `Ok(None)` for an unknown version.
    pub fn decode(raw: &str) -> CacheResult<Option<Self>> {
        let snapshot: Snapshot<T> = serde_json::from_str(raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_layout() {
        let raw = r#"{
            "version": 1,
            "savedAt": 10,
            "entries": [{
                "key": "/festivals",
                "value": ["Primavera", "Roskilde"],
                "createdAt": 0,
                "expiresAt": 3600000,
                "lastAccessedAt": 5,
                "accessCount": 2,
                "sizeBytes": 46,
                "tags": ["festivals"]
            }],
            "stats": {"hits": 2, "misses": 1, "evictions": 0, "expirations": 0, "sets": 1}
        }"#;

        let snapshot = Snapshot::<Vec<String>>::decode(raw).unwrap().unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].key, "/festivals");
        assert_eq!(snapshot.entries[0].entry.value()[1], "Roskilde");
        assert!(snapshot.entries[0].entry.has_tag("festivals"));
        assert_eq!(snapshot.stats.hits, 2);
    }

    #[test]
    fn test_unknown_version_ignored() {
        let raw = r#"{"version": 99, "savedAt": 0, "entries": []}"#;
        assert!(Snapshot::<u32>::decode(raw).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(Snapshot::<u32>::decode("not json").is_err());
    }
}
