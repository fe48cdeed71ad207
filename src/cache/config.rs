//! Cache configuration.
//!
//! Controls the process-local L1 tier and the shared L2 tier via `atrium.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_L1_TTL_SECS: u64 = 30;
const DEFAULT_L1_CAPACITY: usize = 64;
const DEFAULT_L2_TTL_SECS: u64 = 300;
const DEFAULT_L2_TIMEOUT_MS: u64 = 250;

/// Resolved cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an L1 entry stays fresh.
    pub l1_ttl: Duration,
    /// Maximum number of L1 entries before LRU eviction.
    pub l1_capacity: usize,
    /// Expiry handed to the shared store on write.
    pub l2_ttl: Duration,
    /// Upper bound for any single shared-store call.
    pub l2_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl: Duration::from_secs(DEFAULT_L1_TTL_SECS),
            l1_capacity: DEFAULT_L1_CAPACITY,
            l2_ttl: Duration::from_secs(DEFAULT_L2_TTL_SECS),
            l2_timeout: Duration::from_millis(DEFAULT_L2_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            l1_ttl: settings.l1_ttl,
            l1_capacity: settings.l1_capacity.get(),
            l2_ttl: settings.l2_ttl,
            l2_timeout: settings.l2_timeout,
        }
    }
}

impl CacheConfig {
    /// Returns the L1 capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn l1_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.l1_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// L2 expiry in whole seconds, never below one.
    pub fn l2_ttl_secs(&self) -> u64 {
        self.l2_ttl.as_secs().max(1)
    }
}
