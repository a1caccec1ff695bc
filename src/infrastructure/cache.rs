//! TTL cache for read-path lookups (customer profiles).
//!
//! Backed by `cached::TimedCache`; entries expire after a fixed lifespan and
//! a background task periodically flushes expired entries.

use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Default profile lifespan in seconds.
pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Arc<Mutex<TimedCache<String, V>>>,
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(TimedCache::with_lifespan(ttl_secs))),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        entries.cache_get(&key.to_string()).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().await;
        entries.cache_set(key.into(), value);
    }

    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.cache_remove(&key.to_string());
    }

    /// Entries currently held, expired ones included until the next sweep.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops expired entries now.
    pub async fn sweep(&self) {
        self.entries.lock().await.flush();
    }

    /// Spawns the periodic sweep. Abort the handle to stop it.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
                tracing::trace!("cache sweep finished");
            }
        })
    }
}
