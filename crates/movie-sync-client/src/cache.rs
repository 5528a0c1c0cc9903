use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Bounded TTL cache for idempotent read responses.
///
/// Expired entries are dropped lazily when read. When the cache is full the
/// oldest-inserted entry goes first, which is close enough to LRU for short-TTL,
/// read-mostly traffic.
pub struct ResponseCache<V> {
    entries: Mutex<IndexMap<String, CacheEntry<V>>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            trace!(key = %key, "cache entry expired");
            entries.shift_remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.lock();
        // Re-inserting moves the key to the newest position
        entries.shift_remove(&key);
        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                trace!(key = %evicted, "cache full, evicted oldest entry");
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().shift_remove(key).is_some()
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired ones included until they are read
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("genres", 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("genres"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("genres"), None);
        assert!(cache.is_empty());

        cache.set("genres", 2);
        assert_eq!(cache.get("genres"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_entry_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(300));
        cache.set_with_ttl("search:alien:1", "short", Duration::from_secs(5));
        cache.set("movie:603", "long");

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("search:alien:1"), None);
        assert_eq!(cache.get("movie:603"), Some("long"));
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_reset_key_refreshes_position() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("discover:popular:1", 1);
        cache.set("discover:popular:2", 2);
        cache.set("movie:1", 3);

        assert!(cache.delete("movie:1"));
        assert!(!cache.delete("movie:1"));
        assert_eq!(cache.delete_prefix("discover:"), 2);

        cache.set("x", 4);
        cache.clear();
        assert!(cache.is_empty());
    }
}
