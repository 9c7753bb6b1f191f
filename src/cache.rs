//! Time-bounded result cache.
//!
//! A process-wide map from canonical cache keys to previously computed JSON
//! payloads. Entries live for a fixed TTL (30 s by default); expiry happens
//! lazily on lookup and via a periodic sweep running on the same period as
//! the TTL. Entries are replaced wholesale on refresh, never mutated.
//!
//! There is deliberately no in-flight coalescing: concurrent callers racing
//! on a cold key each run their own compute, and the last store wins. A
//! failed compute stores nothing, leaving the key absent for the next
//! attempt.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Default entry lifetime in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 30_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

/// Snapshot of the cache contents for the observability endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
    /// Summed serialized size of the cached payloads, in bytes.
    #[serde(rename = "memoryUsage")]
    pub memory_usage: usize,
}

/// Shared TTL-keyed result store.
#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResultCache {
    /// Creates a cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: ttl.max(Duration::from_millis(1)),
        }
    }

    /// Creates a cache with the default 30 s lifetime.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TTL_MS))
    }

    /// Returns the payload for `key` if a non-expired entry exists. An
    /// expired entry found here is dropped immediately.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().await.remove(key);
        None
    }

    /// Stores `payload` under `key`, replacing any previous entry.
    pub async fn insert(&self, key: &str, payload: Value) {
        let entry = CacheEntry {
            payload,
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Returns the cached payload for `key`, or runs `compute`, stores its
    /// result, and returns it.
    ///
    /// The compute future runs without holding the map lock, so concurrent
    /// callers on the same cold key are not deduplicated. Errors pass
    /// through uncached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::debug!(key, "cache hit");
            return Ok(hit);
        }
        let payload = compute().await?;
        self.insert(key, payload.clone()).await;
        tracing::debug!(key, "cache store");
        Ok(payload)
    }

    /// Removes every entry older than the TTL. Returns the removed count.
    pub async fn invalidate_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        before - entries.len()
    }

    /// Removes all entries immediately.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Reports entry count, key list, and approximate payload footprint.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let memory_usage = entries
            .values()
            .map(|entry| entry.payload.to_string().len())
            .sum();
        CacheStats {
            size: entries.len(),
            keys: entries.keys().cloned().collect(),
            memory_usage,
        }
    }

    /// Spawns the periodic sweep, one pass per TTL interval. The task is
    /// fire-and-forget and never blocks request handling.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(cache.ttl);
            tick.tick().await; // first tick fires immediately
            loop {
                tick.tick().await;
                let removed = cache.invalidate_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_compute(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures::future::Ready<Result<Value, Infallible>> {
        let counter = counter.clone();
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            futures::future::ready(Ok(json!({ "run": n })))
        }
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_skips_compute() {
        let cache = ResultCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute("k", counting_compute(&calls))
            .await
            .unwrap();
        let second = cache
            .get_or_compute("k", counting_compute(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_entry_triggers_fresh_compute() {
        let cache = ResultCache::new(Duration::from_millis(40));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute("k", counting_compute(&calls))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
        let second = cache
            .get_or_compute("k", counting_compute(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn failed_compute_leaves_key_absent() {
        let cache = ResultCache::new(Duration::from_secs(30));

        let failed: Result<Value, String> = cache
            .get_or_compute("k", || futures::future::ready(Err("store offline".to_string())))
            .await;
        assert!(failed.is_err());
        assert!(cache.get("k").await.is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_compute("k", counting_compute(&calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let cache = ResultCache::new(Duration::from_millis(60));
        cache.insert("old", json!(1)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.insert("fresh", json!(2)).await;

        let removed = cache.invalidate_expired().await;
        assert_eq!(removed, 1);

        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.keys, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResultCache::new(Duration::from_secs(30));
        cache.insert("a", json!(1)).await;
        cache.insert("b", json!(2)).await;
        cache.clear().await;
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn refresh_overwrites_the_previous_entry() {
        let cache = ResultCache::new(Duration::from_secs(30));
        cache.insert("k", json!("old")).await;
        cache.insert("k", json!("new")).await;
        assert_eq!(cache.get("k").await, Some(json!("new")));
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn stats_reports_payload_footprint() {
        let cache = ResultCache::new(Duration::from_secs(30));
        cache.insert("k", json!({ "value": "abc" })).await;
        let stats = cache.stats().await;
        assert_eq!(stats.memory_usage, json!({ "value": "abc" }).to_string().len());
    }
}
