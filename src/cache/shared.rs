//! L2 seam: the shared key-value store reachable over the network.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedStoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
    #[error("shared store command failed: {0}")]
    Command(String),
}

/// Operations the tiered cache needs from the shared tier.
///
/// `pattern` arguments are plain substrings; implementations translate them
/// into whatever matching syntax the backend speaks.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Short backend label for logs and health output.
    fn backend(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), SharedStoreError>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, SharedStoreError>;

    /// Returns the number of keys actually removed.
    async fn delete(&self, keys: &[String]) -> Result<u64, SharedStoreError>;
}

/// Stand-in used when no shared store is configured; the cache runs L1-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStore;

#[async_trait]
impl SharedStore for DisabledStore {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), SharedStoreError> {
        Ok(())
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, SharedStoreError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, SharedStoreError> {
        Ok(0)
    }
}
