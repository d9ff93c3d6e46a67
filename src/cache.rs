//! Bounded in-memory cache with lazy TTL expiry.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

/// Read-through cache holding the most recent value per key for a bounded
/// time.
///
/// Expiry is lazy (checked on read, no sweeper task) and capacity is
/// enforced by dropping the oldest insertion. Entries are replaced
/// wholesale, never mutated in place. Concurrent misses on the same key
/// are not coalesced; each caller fetches and the last write wins.
pub struct TtlCache<V> {
    capacity: usize,
    inner: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key` if still fresh; otherwise runs
    /// `fetch`, stores the result for `ttl`, and returns it.
    ///
    /// The fetched value is stored even when it encodes an upstream
    /// failure, so a down upstream is retried at most once per TTL window.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(key).await {
            return hit;
        }

        let value = fetch().await;
        self.insert(key, value.clone(), ttl).await;
        value
    }

    async fn get(&self, key: &str) -> Option<V> {
        let map = self.inner.read().await;
        let entry = map.get(key)?;
        if Instant::now() < entry.expires_at {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    async fn insert(&self, key: &str, value: V, ttl: Duration) {
        let mut map = self.inner.write().await;

        if map.len() >= self.capacity && !map.contains_key(key) {
            let oldest = map
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                map.remove(&oldest);
            }
        }

        let now = Instant::now();
        map.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }
}
