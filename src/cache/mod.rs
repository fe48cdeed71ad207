//! Atrium Cache System
//!
//! Two tiers sit in front of the menu source:
//!
//! - **L1 (Local)**: process-local LRU with a short TTL
//! - **L2 (Shared)**: an external key-value store shared by every instance
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `atrium.toml`:
//!
//! ```toml
//! [cache]
//! l1_ttl_seconds = 30
//! l1_capacity = 64
//! l2_ttl_seconds = 300
//! l2_timeout_ms = 250
//! redis_url = "redis://127.0.0.1:6379"
//! ```
//!
//! Leaving `redis_url` unset runs the cache with L1 only.

mod config;
mod keys;
mod lock;
mod shared;
mod store;
mod tiered;
mod trigger;

pub use config::CacheConfig;
pub use keys::{CacheKey, MENU_NAMESPACE};
pub use shared::{DisabledStore, SharedStore, SharedStoreError};
pub use store::LocalStore;
pub use tiered::{
    CacheHit, CacheStats, CacheTier, InvalidationReport, PatternInvalidation, SharedPurge,
    TieredCache,
};
pub use trigger::CacheTrigger;
