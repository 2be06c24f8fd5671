//! tenantcache - O(1) LFU Cache for Per-Tenant Settings
//!
//! Holds small per-tenant configuration records in memory, avoiding a
//! backing-store round trip on every read while bounding memory use and
//! evicting low-value entries under pressure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  TenantSettingsCache                          │
//! │  ┌──────────────────────────┐   ┌─────────────────────────┐  │
//! │  │  LfuCache<TenantId,      │──▶│  SettingsStore          │  │
//! │  │    TenantSettings>       │   │  (async read / upsert)  │  │
//! │  │  frequency tiers + index │◀──│                         │  │
//! │  └──────────────────────────┘   └─────────────────────────┘  │
//! │   hits served in memory          misses + write-through      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads promote an entry one frequency tier; inserting a new key at
//! capacity evicts a batch of entries from the lowest tier, oldest first.
//! Writes go through the store before the cached record is replaced.
//!
//! # Modules
//!
//! - [`cache`] - LFU engine and the tenant settings binding
//! - [`settings`] - the cached record type
//! - [`store`] - backing store trait and in-memory backend
//! - [`error`] - error types

pub mod cache;
pub mod error;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use cache::{
    CacheConfig, CacheStats, LfuCache, Loader, TenantSettingsCache, DEFAULT_CAPACITY,
    DEFAULT_EVICT_BATCH,
};
pub use error::{Error, Result};
pub use settings::{TenantId, TenantSettings};
pub use store::{InMemorySettingsStore, SettingsStore, StoreStats, DEFAULT_PREFIX};
