//! L1 storage: a process-local, TTL-bounded LRU map.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

/// A value plus the moment it was written into L1.
pub struct CacheEntry<V> {
    value: Arc<V>,
    written_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: Arc<V>) -> Self {
        Self {
            value,
            written_at: Instant::now(),
        }
    }

    /// Fresh while `now - written_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.written_at.elapsed() < ttl
    }
}

/// Process-local tier.
///
/// Expired entries are treated as absent and dropped on the read that finds
/// them. The lock is never held across an await point.
pub struct LocalStore<V> {
    ttl: Duration,
    entries: RwLock<LruCache<String, CacheEntry<V>>>,
}

impl<V> LocalStore<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.l1_ttl,
            entries: RwLock::new(LruCache::new(config.l1_capacity_non_zero())),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut entries = rw_write(&self.entries, "l1_get");
        let lookup = entries
            .get(key)
            .map(|entry| entry.is_fresh(self.ttl).then(|| Arc::clone(&entry.value)));

        match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: &str, value: Arc<V>) {
        rw_write(&self.entries, "l1_insert").put(key.to_string(), CacheEntry::new(value));
    }

    /// Remove every key containing `pattern`; returns how many were dropped.
    pub fn remove_matching(&self, pattern: &str) -> usize {
        let mut entries = rw_write(&self.entries, "l1_remove_matching");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "l1_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn store_with_ttl(ttl: Duration) -> LocalStore<String> {
        LocalStore::new(&CacheConfig {
            l1_ttl: ttl,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_at_ttl() {
        let store = store_with_ttl(Duration::from_secs(30));
        store.insert("menu:guest", Arc::new("payload".to_string()));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(store.get("menu:guest").as_deref(), Some(&"payload".to_string()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("menu:guest").is_none());
        assert!(store.is_empty(), "expired entry is evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn rewrite_refreshes_write_time() {
        let store = store_with_ttl(Duration::from_secs(10));
        store.insert("menu:user", Arc::new("v1".to_string()));
        tokio::time::advance(Duration::from_secs(8)).await;
        store.insert("menu:user", Arc::new("v2".to_string()));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get("menu:user").as_deref(), Some(&"v2".to_string()));
    }

    #[test]
    fn remove_matching_only_touches_matching_keys() {
        let store = store_with_ttl(Duration::from_secs(30));
        store.insert("menu:guest", Arc::new("a".to_string()));
        store.insert("menu:admin", Arc::new("b".to_string()));
        store.insert("settings:site", Arc::new("c".to_string()));

        assert_eq!(store.remove_matching("menu"), 2);
        assert!(store.get("menu:guest").is_none());
        assert!(store.get("menu:admin").is_none());
        assert!(store.get("settings:site").is_some());
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let store: LocalStore<u32> = LocalStore::new(&CacheConfig {
            l1_capacity: 2,
            ..Default::default()
        });
        store.insert("menu:guest", Arc::new(1));
        store.insert("menu:user", Arc::new(2));
        assert!(store.get("menu:guest").is_some());

        store.insert("menu:admin", Arc::new(3));

        assert!(store.get("menu:user").is_none(), "least recently used is evicted");
        assert!(store.get("menu:guest").is_some());
        assert!(store.get("menu:admin").is_some());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store_with_ttl(Duration::from_secs(30));

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.insert("menu:guest", Arc::new("after".to_string()));
        assert!(store.get("menu:guest").is_some());
    }
}
