//! Internal storage for the cache.
//!
//! An `IndexMap` keeps entries in recency order: the front is the least
//! recently used entry, and every read or write moves its key to the back.
//! Insertion order therefore breaks ties between entries that were last
//! touched in the same millisecond. `Store` holds no lock of its own; the
//! cache wraps it.

use indexmap::IndexMap;

use crate::entry::Entry;

/// Result of a lookup.
#[derive(Debug, PartialEq)]
pub(crate) enum Lookup<'a, T> {
    Hit(&'a T),
    /// The key was present but expired; it has been removed.
    Expired,
    Missing,
}

/// What an insert did to the rest of the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InsertOutcome {
    /// Whether the new entry is now in the store.
    pub stored: bool,
    /// Whether an entry for the same key was replaced or discarded.
    pub replaced: bool,
    /// Entries evicted to make room.
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Store<T> {
    entries: IndexMap<String, Entry<T>>,
    total_size: usize,
    max_size_bytes: Option<usize>,
    max_entries: Option<usize>,
}

impl<T> Store<T> {
    pub fn new(max_size_bytes: Option<usize>, max_entries: Option<usize>) -> Self {
        Self {
            entries: IndexMap::new(),
            total_size: 0,
            max_size_bytes,
            max_entries,
        }
    }

    /// Look up `key`, recording the access on a hit.
    pub fn get(&mut self, key: &str, now: i64) -> Lookup<'_, T> {
        let Some(idx) = self.entries.get_index_of(key) else {
            return Lookup::Missing;
        };

        if self.entries[idx].is_expired_at(now) {
            self.remove_index(idx);
            return Lookup::Expired;
        }

        self.entries[idx].touch_at(now);
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        Lookup::Hit(&self.entries[last].value)
    }

    /// Whether a live entry exists, without touching it.
    pub fn contains(&self, key: &str, now: i64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Insert `entry`, evicting least recently used entries until it fits.
    ///
    /// Any previous entry for `key` is removed first. An entry larger than
    /// the whole byte budget is dropped.
    pub fn insert(&mut self, key: String, entry: Entry<T>) -> InsertOutcome {
        let mut outcome = InsertOutcome {
            replaced: self.remove(&key).is_some(),
            ..InsertOutcome::default()
        };

        if let Some(max) = self.max_size_bytes {
            if entry.size_bytes > max {
                return outcome;
            }
            while self.total_size.saturating_add(entry.size_bytes) > max && self.evict_lru() {
                outcome.evicted += 1;
            }
        }

        if let Some(max) = self.max_entries {
            while self.entries.len() >= max && self.evict_lru() {
                outcome.evicted += 1;
            }
        }

        self.total_size = self.total_size.saturating_add(entry.size_bytes);
        self.entries.insert(key, entry);
        outcome.stored = true;
        outcome
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry<T>> {
        let idx = self.entries.get_index_of(key)?;
        self.remove_index(idx)
    }

    /// Remove every entry carrying `tag`. Returns the number removed.
    pub fn remove_tagged(&mut self, tag: &str) -> usize {
        self.remove_where(|entry| entry.has_tag(tag))
    }

    /// Remove every entry expired at `now`. Returns the number removed.
    pub fn remove_expired(&mut self, now: i64) -> usize {
        self.remove_where(|entry| entry.is_expired_at(now))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Entries from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry<T>)> {
        self.entries.iter()
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&Entry<T>) -> bool) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            let remove = predicate(entry);
            if remove {
                freed = entry.size_bytes.saturating_add(freed);
            }
            !remove
        });
        self.total_size = self.total_size.saturating_sub(freed);
        before - self.entries.len()
    }

    fn remove_index(&mut self, idx: usize) -> Option<Entry<T>> {
        let (_, entry) = self.entries.shift_remove_index(idx)?;
        self.total_size = self.total_size.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Evict the front entry. Returns false when the store is empty.
    fn evict_lru(&mut self) -> bool {
        self.remove_index(0).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: u32, now: i64, size: usize) -> Entry<u32> {
        Entry::new(value, now, 1_000, size, Vec::new())
    }

    fn tagged(value: u32, tag: &str) -> Entry<u32> {
        Entry::new(value, 0, 1_000, 1, vec![tag.to_string()])
    }

    #[test]
    fn test_basic_insert_get() {
        let mut store = Store::new(None, None);
        store.insert("a".into(), entry(1, 0, 4));

        assert_eq!(store.get("a", 10), Lookup::Hit(&1));
        assert_eq!(store.get("b", 10), Lookup::Missing);
        assert_eq!(store.total_size(), 4);
    }

    #[test]
    fn test_expired_lookup_removes_entry() {
        let mut store = Store::new(None, None);
        store.insert("a".into(), entry(1, 0, 4));

        assert!(store.contains("a", 999));
        assert!(!store.contains("a", 1_000));
        assert_eq!(store.get("a", 1_000), Lookup::Expired);
        assert_eq!(store.len(), 0);
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_overwrite_replaces() {
        let mut store = Store::new(None, None);
        store.insert("a".into(), entry(1, 0, 4));
        let outcome = store.insert("a".into(), entry(2, 5, 6));

        assert!(outcome.replaced);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_size(), 6);
        assert_eq!(store.get("a", 10), Lookup::Hit(&2));
    }

    #[test]
    fn test_byte_budget_evicts_lru() {
        let mut store = Store::new(Some(10), None);
        store.insert("a".into(), entry(1, 0, 4));
        store.insert("b".into(), entry(2, 1, 4));
        let _ = store.get("a", 2);

        let outcome = store.insert("c".into(), entry(3, 3, 4));
        assert_eq!(outcome.evicted, 1);
        assert!(store.contains("a", 3));
        assert!(!store.contains("b", 3));
        assert!(store.contains("c", 3));
        assert_eq!(store.total_size(), 8);
    }

    #[test]
    fn test_entry_bound_evicts_lru() {
        let mut store = Store::new(None, Some(2));
        store.insert("a".into(), entry(1, 0, 1));
        store.insert("b".into(), entry(2, 0, 1));
        store.insert("c".into(), entry(3, 0, 1));

        let keys: Vec<_> = store.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_oversized_entry_dropped() {
        let mut store = Store::new(Some(10), None);
        store.insert("a".into(), entry(1, 0, 4));
        let outcome = store.insert("big".into(), entry(2, 0, 11));

        assert!(!outcome.stored);
        assert_eq!(outcome.evicted, 0);
        assert!(store.contains("a", 0));
        assert!(!store.contains("big", 0));
    }

    #[test]
    fn test_oversized_overwrite_discards_old_value() {
        let mut store = Store::new(Some(10), None);
        store.insert("a".into(), entry(1, 0, 4));
        let outcome = store.insert("a".into(), entry(2, 0, 11));

        assert!(outcome.replaced);
        assert!(!outcome.stored);
        assert_eq!(store.len(), 0);
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_remove_tagged() {
        let mut store = Store::new(None, None);
        store.insert("a".into(), tagged(1, "x"));
        store.insert("b".into(), tagged(2, "y"));
        store.insert("c".into(), entry(3, 0, 1));

        assert_eq!(store.remove_tagged("x"), 1);
        assert_eq!(store.remove_tagged("x"), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_size(), 2);
    }

    #[test]
    fn test_remove_expired() {
        let mut store = Store::new(None, None);
        store.insert("old".into(), entry(1, 0, 1));
        store.insert("new".into(), entry(2, 500, 1));

        assert_eq!(store.remove_expired(1_000), 1);
        assert!(store.contains("new", 1_000));
    }
}
