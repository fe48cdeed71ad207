//! Redis-backed shared cache tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tracing::{info, warn};

use crate::cache::{DisabledStore, SharedStore, SharedStoreError};
use crate::config::CacheSettings;

use super::error::InfraError;

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url`. Connections are opened lazily.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self, InfraError> {
        let mut config = RedisPoolConfig::from_url(url);
        let pool_config = config.pool.get_or_insert_with(|| PoolConfig::new(pool_size));
        pool_config.max_size = pool_size;
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| InfraError::cache(format!("failed to create redis pool: {err}")))?;
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<Connection, SharedStoreError> {
        self.pool
            .get()
            .await
            .map_err(|err| SharedStoreError::Unavailable(err.to_string()))
    }

    /// Check out one connection; used at startup to report reachability.
    pub async fn probe(&self) -> Result<(), SharedStoreError> {
        self.connection().await.map(|_| ())
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(command_error)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), SharedStoreError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(command_error)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, SharedStoreError> {
        let mut conn = self.connection().await?;
        conn.keys::<_, Vec<String>>(contains_glob(pattern))
            .await
            .map_err(command_error)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, SharedStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        conn.del::<_, u64>(keys).await.map_err(command_error)
    }
}

/// Choose the shared tier once at startup.
///
/// No URL, or a pool that cannot be built, yields the local-only stand-in.
/// An unreachable server at startup is only logged: calls keep timing out
/// quickly until it comes back.
pub async fn shared_store(settings: &CacheSettings) -> Arc<dyn SharedStore> {
    let Some(url) = settings.redis_url.as_deref() else {
        info!(
            target = "atrium::infra::redis",
            "no redis_url configured; menu cache runs with L1 only"
        );
        return Arc::new(DisabledStore);
    };

    let pool_size = settings.redis_pool_size.get() as usize;
    let store = match RedisStore::connect(url, pool_size, settings.l2_timeout) {
        Ok(store) => store,
        Err(err) => {
            warn!(
                target = "atrium::infra::redis",
                error = %err,
                "falling back to L1-only menu cache"
            );
            return Arc::new(DisabledStore);
        }
    };

    match store.probe().await {
        Ok(()) => info!(
            target = "atrium::infra::redis",
            pool_size,
            "connected to shared cache tier"
        ),
        Err(err) => warn!(
            target = "atrium::infra::redis",
            error = %err,
            "shared cache tier unreachable at startup; continuing and retrying per request"
        ),
    }

    Arc::new(store)
}

fn command_error(err: redis::RedisError) -> SharedStoreError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        SharedStoreError::Unavailable(err.to_string())
    } else {
        SharedStoreError::Command(err.to_string())
    }
}

/// `KEYS` glob matching any key that contains `pattern` literally.
fn contains_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len() + 2);
    glob.push('*');
    for ch in pattern.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\' | '^') {
            glob.push('\\');
        }
        glob.push(ch);
    }
    glob.push('*');
    glob
}
