//! Capacity-bounded in-memory cache with per-entry expiry.

use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default number of entries kept per cache.
pub const DEFAULT_CAPACITY: usize = 100;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// String-keyed LRU cache with a TTL.
///
/// Expired entries count as misses. Inserting into a full cache evicts the
/// least recently used entry. The lock is never held across a fetch, so
/// concurrent misses for one key may fetch twice.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cached value for `key`, if present and not expired. A hit marks the
    /// entry as most recently used.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Store `value` under `key`, evicting the least recently used entry
    /// when full.
    pub async fn insert(&self, key: String, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries.lock().await.put(key, entry);
    }

    /// Return the cached value or run `fetch` and cache its success.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            tracing::trace!(key, "Cache hit");
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key.to_string(), value.clone()).await;
        Ok(value)
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
