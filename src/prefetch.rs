//! Speculative cache warming driven by navigation signals.
//!
//! The advisor turns route changes and link intent into low-cost fetches
//! that populate the cache ahead of the user. Every queued path moves
//! through `Unqueued -> Queued -> InFlight -> Unqueued`; a path already
//! queued or in flight is never queued again.
//!
//! Prefetching is an optimization only. Fetch failures are logged at debug
//! level and dropped, and a completed prefetch never overwrites a value the
//! application stored while the fetch was running.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{KeyedCache, SetOptions};
use crate::config::PrefetchConfig;
use crate::error::{CacheError, CacheResult, FetchError};
use crate::routes::{normalize_path, RouteRules};

/// How urgently a path should be warmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PrefetchConfig {
    /// Delay before a prefetch of the given priority starts.
    pub fn delay_for(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high_delay,
            Priority::Normal => self.normal_delay,
            Priority::Low => self.low_delay,
        }
    }
}

/// Where a path is in the prefetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchState {
    Unqueued,
    Queued,
    InFlight,
}

/// Loads the payload for a path. Timeouts are the fetcher's concern.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<T, FetchError>;
}

/// Fire-and-forget receiver of prefetch events.
pub trait AnalyticsSink: Send + Sync + fmt::Debug {
    fn prefetch_issued(&self, path: &str, priority: Priority);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn prefetch_issued(&self, _path: &str, _priority: Priority) {}
}

/// Emits every event as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn prefetch_issued(&self, path: &str, priority: Priority) {
        info!(target: "festival_cache::analytics", path, priority = %priority, "prefetch_issued");
    }
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Lifetime prefetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    /// Prefetches queued.
    pub issued: u64,
    /// Prefetches whose result was stored.
    pub completed: u64,
    /// Prefetches whose fetch failed.
    pub failed: u64,
    /// Suggestions or results dropped because the cache already had the path.
    pub skipped: u64,
}

type Queue = Arc<Mutex<HashMap<String, PrefetchState>>>;

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a path from the queue when its task ends, however it ends.
struct QueueSlot {
    queue: Queue,
    path: String,
}

impl QueueSlot {
    fn set(&self, state: PrefetchState) {
        if let Some(slot) = lock(&self.queue).get_mut(&self.path) {
            *slot = state;
        }
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        lock(&self.queue).remove(&self.path);
    }
}

/// Decides which paths to warm and warms them in the background.
pub struct PrefetchAdvisor<T> {
    cache: KeyedCache<T>,
    fetcher: Arc<dyn Fetcher<T>>,
    analytics: Arc<dyn AnalyticsSink>,
    rules: RouteRules,
    config: PrefetchConfig,
    queue: Queue,
    current: Mutex<Option<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    runtime: Handle,
}

impl<T> fmt::Debug for PrefetchAdvisor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchAdvisor")
            .field("rules", &self.rules.len())
            .field("pending", &lock(&self.queue).len())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> PrefetchAdvisor<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create an advisor using the festival site's route table.
    ///
    /// Must be called from within a Tokio runtime; prefetches are spawned
    /// onto it.
    pub fn new(
        cache: KeyedCache<T>,
        fetcher: Arc<dyn Fetcher<T>>,
        config: PrefetchConfig,
    ) -> CacheResult<Self> {
        let runtime =
            Handle::try_current().map_err(|err| CacheError::RuntimeUnavailable(err.to_string()))?;

        Ok(Self {
            cache,
            fetcher,
            analytics: Arc::new(TracingAnalytics),
            rules: RouteRules::festival_site(),
            config,
            queue: Arc::new(Mutex::new(HashMap::new())),
            current: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            runtime,
        })
    }

    /// Replace the route table.
    pub fn with_rules(mut self, rules: RouteRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the analytics sink.
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Record a route change and warm the routes likely to follow it.
    pub fn record_navigation(&self, path: &str) {
        let Some(path) = normalize_path(path) else {
            return;
        };
        debug!(path = %path, "navigation recorded");
        *lock(&self.current) = Some(path.clone());

        for next in self.rules.predict(&path) {
            self.suggest(&next, Priority::Low);
        }
    }

    /// Record a strong intent signal (hover, click) on a link to `path`.
    pub fn record_intent(&self, path: &str) -> bool {
        self.suggest(path, Priority::High)
    }

    /// The user stopped scrolling: warm the current route's predictions
    /// at normal priority.
    pub fn record_scroll_settled(&self) {
        let Some(current) = lock(&self.current).clone() else {
            return;
        };
        for next in self.rules.predict(&current) {
            self.suggest(&next, Priority::Normal);
        }
    }

    /// Queue a fetch-and-cache of `path` unless it is cached, already
    /// queued, or the queue is full. Returns whether it was queued.
    pub fn suggest(&self, path: &str, priority: Priority) -> bool {
        let Some(path) = normalize_path(path) else {
            debug!(path, "ignoring prefetch of non same-origin path");
            return false;
        };

        if self.cache.contains(&path) {
            Counters::bump(&self.counters.skipped);
            return false;
        }

        {
            let mut queue = lock(&self.queue);
            if queue.contains_key(&path) {
                return false;
            }
            if queue.len() >= self.config.max_pending {
                debug!(path = %path, pending = queue.len(), "prefetch queue full");
                return false;
            }
            queue.insert(path.clone(), PrefetchState::Queued);
        }

        Counters::bump(&self.counters.issued);
        self.analytics.prefetch_issued(&path, priority);

        let slot = QueueSlot {
            queue: Arc::clone(&self.queue),
            path,
        };
        let handle = self.runtime.spawn(run_prefetch(
            slot,
            self.cache.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.counters),
            self.config.delay_for(priority),
            self.set_options(),
        ));

        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        true
    }

    /// Lifecycle state of `path`.
    pub fn state(&self, path: &str) -> PrefetchState {
        normalize_path(path)
            .and_then(|path| lock(&self.queue).get(&path).copied())
            .unwrap_or(PrefetchState::Unqueued)
    }

    /// Number of queued or in-flight prefetches.
    pub fn pending_count(&self) -> usize {
        lock(&self.queue).len()
    }

    /// The last route passed to `record_navigation`.
    pub fn current_route(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            issued: self.counters.issued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Wait for every prefetch spawned so far to finish.
    pub async fn settle(&self) {
        loop {
            let tasks: Vec<_> = lock(&self.tasks).drain(..).collect();
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }

    fn set_options(&self) -> SetOptions {
        let options = SetOptions::new().tag(self.config.prefetch_tag.clone());
        match self.config.prefetch_ttl {
            Some(ttl) => options.ttl(ttl),
            None => options,
        }
    }
}

async fn run_prefetch<T>(
    slot: QueueSlot,
    cache: KeyedCache<T>,
    fetcher: Arc<dyn Fetcher<T>>,
    counters: Arc<Counters>,
    delay: Duration,
    options: SetOptions,
) where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    // A real request may have filled the cache while we waited.
    if cache.contains(&slot.path) {
        Counters::bump(&counters.skipped);
        return;
    }

    slot.set(PrefetchState::InFlight);
    match fetcher.fetch(&slot.path).await {
        Ok(value) => match cache.insert_if_absent(slot.path.clone(), value, options) {
            Ok(true) => {
                Counters::bump(&counters.completed);
                debug!(path = %slot.path, "prefetch stored");
            }
            Ok(false) => {
                Counters::bump(&counters.skipped);
                debug!(path = %slot.path, "prefetch result superseded by a newer value");
            }
            Err(err) => {
                Counters::bump(&counters.failed);
                debug!(path = %slot.path, error = %err, "prefetch result rejected by cache");
            }
        },
        Err(err) => {
            Counters::bump(&counters.failed);
            debug!(path = %slot.path, error = %err, "prefetch failed");
        }
    }
}
