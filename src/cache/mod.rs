//! O(1) LFU Cache
//!
//! Least-frequently-used cache built on a list of frequency tiers, each
//! owning a FIFO sub-list of the entries at that access count. Lookup,
//! insertion, promotion, and per-entry eviction are all O(1); ties within a
//! frequency are broken oldest-first.
//!
//! The engine ([`LfuCache`]) is generic over key, value, and an async
//! [`Loader`] consulted on miss. [`TenantSettingsCache`] is the concrete
//! binding used by the application: tenant settings records over a
//! [`crate::store::SettingsStore`], with write-through field helpers.

pub mod arena;
mod lfu;
mod node;
mod tenant;

pub use lfu::{CacheStats, LfuCache, Loader};
pub use tenant::TenantSettingsCache;

/// Default maximum number of cached tenants
pub const DEFAULT_CAPACITY: usize = 500;

/// Default number of entries removed per eviction event
pub const DEFAULT_EVICT_BATCH: usize = 50;

/// Cache sizing configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of distinct keys held
    pub capacity: usize,
    /// Entries removed per eviction event
    ///
    /// A batch larger than `capacity` is accepted; eviction then simply
    /// empties the cache before the triggering insert.
    pub evict_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            evict_batch: DEFAULT_EVICT_BATCH,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
