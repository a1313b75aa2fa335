//! Best-effort persistence of cache snapshots.
//!
//! The persister owns the durable store handle and decides what to do with
//! its failures:
//! - `StorageUnavailable` switches the cache to memory-only mode for the
//!   rest of the process lifetime and is logged once.
//! - `QuotaExceeded` drops that single write.
//! - Anything else is logged and otherwise ignored.
//!
//! Nothing here returns an error to the cache.

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::durable::DurableStore;
use crate::error::CacheError;
use crate::snapshot::Snapshot;

#[derive(Debug)]
pub(crate) struct Persister {
    store: Arc<dyn DurableStore>,
    key: String,
    disabled: AtomicBool,
    dirty: AtomicBool,
    flusher: AtomicBool,
    notify: Notify,
}

impl Persister {
    pub fn new(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            disabled: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            flusher: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Whether snapshots are still being written.
    pub fn is_available(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    /// Read the stored snapshot, discarding it if it cannot be used.
    pub fn load<T: DeserializeOwned>(&self) -> Option<Snapshot<T>> {
        let raw = match self.store.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                self.handle_error(err);
                return None;
            }
        };

        match Snapshot::decode(&raw) {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => {
                warn!(key = %self.key, "discarding cache snapshot with unknown version");
                self.remove();
                None
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unreadable cache snapshot");
                self.remove();
                None
            }
        }
    }

    /// Write an encoded snapshot.
    pub fn write(&self, payload: &str) {
        if !self.is_available() {
            return;
        }
        match self.store.set_item(&self.key, payload) {
            Ok(()) => debug!(key = %self.key, bytes = payload.len(), "cache snapshot written"),
            Err(err) => self.handle_error(err),
        }
    }

    /// Delete the stored snapshot.
    pub fn remove(&self) {
        if !self.is_available() {
            return;
        }
        if let Err(err) = self.store.remove_item(&self.key) {
            self.handle_error(err);
        }
    }

    /// Flag that the in-memory state differs from the stored snapshot.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Record whether a background flusher is draining dirty state.
    pub fn attach_flusher(&self, attached: bool) {
        self.flusher.store(attached, Ordering::Release);
    }

    pub fn has_flusher(&self) -> bool {
        self.flusher.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Wait until the next `mark_dirty`.
    pub async fn dirtied(&self) {
        self.notify.notified().await;
    }

    fn handle_error(&self, err: CacheError) {
        match err {
            CacheError::StorageUnavailable(reason) => {
                if !self.disabled.swap(true, Ordering::Relaxed) {
                    warn!(%reason, "durable storage unavailable, cache continues in memory only");
                }
            }
            CacheError::QuotaExceeded { needed, limit } => {
                warn!(needed, limit, "cache snapshot exceeds storage quota, skipping write");
            }
            other => warn!(error = %other, "cache snapshot write failed"),
        }
    }
}
