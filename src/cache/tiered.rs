//! Two-tier cache: process-local L1 in front of a shared L2.
//!
//! L1 always participates. L2 is whatever [`SharedStore`] was chosen at
//! startup; every call to it is bounded by `l2_timeout`, and any failure is
//! logged, counted and then treated as if the tier were absent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::shared::{SharedStore, SharedStoreError};
use super::store::LocalStore;

const METRIC_HIT: &str = "atrium_menu_cache_hit_total";
const METRIC_MISS: &str = "atrium_menu_cache_miss_total";
const METRIC_L2_ERROR: &str = "atrium_menu_cache_l2_error_total";
const METRIC_INVALIDATE: &str = "atrium_menu_cache_invalidate_total";

/// Which tier satisfied a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    L1,
    L2,
}

impl CacheTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::L1 => "L1",
            CacheTier::L2 => "L2",
        }
    }

    fn metric_label(self) -> &'static str {
        match self {
            CacheTier::L1 => "l1",
            CacheTier::L2 => "l2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheHit<V> {
    pub value: Arc<V>,
    pub tier: CacheTier,
}

/// Outcome of the L2 half of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedPurge {
    /// No shared tier configured.
    Disabled,
    /// Keys deleted from the shared tier.
    Purged(u64),
    /// Enumeration or deletion failed; other instances may keep stale
    /// entries until their TTL runs out.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationReport {
    pub local_removed: usize,
    pub shared: SharedPurge,
}

impl InvalidationReport {
    /// L1 was purged but the L2 purge did not go through.
    pub fn is_partial_failure(&self) -> bool {
        matches!(self.shared, SharedPurge::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub l1_entries: usize,
    pub l2_backend: &'static str,
    pub l2_enabled: bool,
}

/// Anything that can drop cached entries by key pattern.
#[async_trait]
pub trait PatternInvalidation: Send + Sync {
    async fn invalidate(&self, pattern: &str) -> InvalidationReport;
}

pub struct TieredCache<V> {
    config: CacheConfig,
    local: LocalStore<V>,
    shared: Arc<dyn SharedStore>,
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig, shared: Arc<dyn SharedStore>) -> Self {
        let local = LocalStore::new(&config);
        Self {
            config,
            local,
            shared,
        }
    }

    /// Fresh L1 entry, else an L2 entry promoted into L1, else `None`.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheHit<V>> {
        if let Some(value) = self.local.get(key.as_str()) {
            return Some(self.hit(key, value, CacheTier::L1));
        }

        if let Some(value) = self.get_shared(key).await {
            let value = Arc::new(value);
            self.local.insert(key.as_str(), Arc::clone(&value));
            return Some(self.hit(key, value, CacheTier::L2));
        }

        counter!(METRIC_MISS).increment(1);
        debug!(target = "atrium::cache", key = %key, "cache miss");
        None
    }

    /// Write L1 unconditionally, then L2 on a best-effort basis.
    pub async fn set(&self, key: &CacheKey, value: Arc<V>) {
        self.local.insert(key.as_str(), Arc::clone(&value));

        if !self.shared.is_enabled() {
            return;
        }

        let payload = match serde_json::to_vec(value.as_ref()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target = "atrium::cache",
                    key = %key,
                    error = %err,
                    "failed to encode cache payload; skipping shared tier"
                );
                return;
            }
        };

        let ttl = Duration::from_secs(self.config.l2_ttl_secs());
        self.shared_op("set", key, self.shared.set(key.as_str(), payload, ttl))
            .await;
    }

    /// Remove every entry whose key contains `pattern` from both tiers.
    pub async fn invalidate(&self, pattern: &str) -> InvalidationReport {
        let local_removed = self.local.remove_matching(pattern);
        let shared = self.purge_shared(pattern).await;
        counter!(METRIC_INVALIDATE).increment(1);

        let report = InvalidationReport {
            local_removed,
            shared,
        };
        info!(
            target = "atrium::cache",
            pattern,
            local_removed,
            shared = ?report.shared,
            "cache invalidated"
        );
        report
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_entries: self.local.len(),
            l2_backend: self.shared.backend(),
            l2_enabled: self.shared.is_enabled(),
        }
    }

    fn hit(&self, key: &CacheKey, value: Arc<V>, tier: CacheTier) -> CacheHit<V> {
        counter!(METRIC_HIT, "tier" => tier.metric_label()).increment(1);
        debug!(target = "atrium::cache", key = %key, tier = tier.as_str(), "cache hit");
        CacheHit { value, tier }
    }

    async fn get_shared(&self, key: &CacheKey) -> Option<V> {
        if !self.shared.is_enabled() {
            return None;
        }

        let bytes = self
            .shared_op("get", key, self.shared.get(key.as_str()))
            .await
            .flatten()?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                counter!(METRIC_L2_ERROR, "op" => "decode").increment(1);
                warn!(
                    target = "atrium::cache",
                    key = %key,
                    error = %err,
                    "undecodable shared cache payload treated as a miss"
                );
                None
            }
        }
    }

    async fn purge_shared(&self, pattern: &str) -> SharedPurge {
        if !self.shared.is_enabled() {
            return SharedPurge::Disabled;
        }

        let Some(keys) = self
            .shared_op("keys", pattern, self.shared.keys(pattern))
            .await
        else {
            return SharedPurge::Failed;
        };

        if keys.is_empty() {
            return SharedPurge::Purged(0);
        }

        match self
            .shared_op("delete", pattern, self.shared.delete(&keys))
            .await
        {
            Some(deleted) => SharedPurge::Purged(deleted),
            None => SharedPurge::Failed,
        }
    }

    /// Run one shared-tier call under the configured timeout. Errors and
    /// timeouts come back as `None`.
    async fn shared_op<T, F>(
        &self,
        op: &'static str,
        subject: impl std::fmt::Display,
        call: F,
    ) -> Option<T>
    where
        F: Future<Output = Result<T, SharedStoreError>>,
    {
        let error = match tokio::time::timeout(self.config.l2_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {:?}", self.config.l2_timeout),
        };

        counter!(METRIC_L2_ERROR, "op" => op).increment(1);
        warn!(
            target = "atrium::cache",
            op,
            subject = %subject,
            backend = self.shared.backend(),
            error = %error,
            "shared cache tier unavailable; continuing without it"
        );
        None
    }
}

#[async_trait]
impl<V> PatternInvalidation for TieredCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn invalidate(&self, pattern: &str) -> InvalidationReport {
        TieredCache::invalidate(self, pattern).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::cache::shared::DisabledStore;
    use crate::domain::types::Role;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SharedStore for MemoryStore {
        fn backend(&self) -> &'static str {
            "memory"
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), SharedStoreError> {
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn keys(&self, pattern: &str) -> Result<Vec<String>, SharedStoreError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .keys()
                .filter(|key| key.contains(pattern))
                .cloned()
                .collect())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, SharedStoreError> {
            let mut entries = self.entries.lock().unwrap();
            Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count() as u64)
        }
    }

    fn cache_with(shared: Arc<dyn SharedStore>) -> TieredCache<Vec<String>> {
        TieredCache::new(CacheConfig::default(), shared)
    }

    #[tokio::test]
    async fn set_then_get_hits_l1() {
        let cache = cache_with(Arc::new(DisabledStore));
        let key = CacheKey::for_role(Role::Guest);
        cache.set(&key, Arc::new(vec!["home".into()])).await;

        let hit = cache.get(&key).await.expect("entry should be cached");
        assert_eq!(hit.tier, CacheTier::L1);
        assert_eq!(hit.value.as_slice(), ["home".to_string()]);
    }

    #[tokio::test]
    async fn l2_hit_is_promoted_into_l1() {
        let shared = Arc::new(MemoryStore::default());
        let key = CacheKey::for_role(Role::User);
        shared
            .set(key.as_str(), br#"["blog"]"#.to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = cache_with(shared);

        let first = cache.get(&key).await.expect("shared entry should be found");
        assert_eq!(first.tier, CacheTier::L2);
        let second = cache.get(&key).await.expect("promoted entry should be found");
        assert_eq!(second.tier, CacheTier::L1);
    }

    #[tokio::test]
    async fn undecodable_shared_payload_is_a_miss() {
        let shared = Arc::new(MemoryStore::default());
        let key = CacheKey::for_role(Role::Admin);
        shared
            .set(key.as_str(), b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = cache_with(shared);

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_reports_both_tiers() {
        let shared = Arc::new(MemoryStore::default());
        let cache = cache_with(shared.clone());
        for role in [Role::Guest, Role::User, Role::Admin] {
            cache
                .set(&CacheKey::for_role(role), Arc::new(Vec::new()))
                .await;
        }

        let report = cache.invalidate("menu").await;

        assert_eq!(report.local_removed, 3);
        assert_eq!(report.shared, SharedPurge::Purged(3));
        assert!(!report.is_partial_failure());
        assert!(shared.entries.lock().unwrap().is_empty());
        assert_eq!(cache.stats().l1_entries, 0);
    }

    #[tokio::test]
    async fn disabled_shared_tier_is_reported() {
        let cache = cache_with(Arc::new(DisabledStore));
        cache
            .set(&CacheKey::for_role(Role::Guest), Arc::new(Vec::new()))
            .await;

        let report = cache.invalidate("menu").await;
        assert_eq!(report.local_removed, 1);
        assert_eq!(report.shared, SharedPurge::Disabled);

        let stats = cache.stats();
        assert!(!stats.l2_enabled);
        assert_eq!(stats.l2_backend, "disabled");
    }
}
