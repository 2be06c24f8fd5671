//! Tenant Settings Cache
//!
//! Binds the generic LFU engine to [`TenantSettings`] records backed by a
//! [`SettingsStore`], and adds write-through helpers that keep store and
//! cache consistent for writes issued through this cache.
//!
//! # Consistency
//!
//! Each helper writes the store first and updates the in-memory copy only
//! after the write succeeds, so a failed store write leaves the cache
//! untouched. Writes made directly against the store by another process are
//! not observed until the entry is evicted and re-fetched; there is no
//! invalidation channel. That is a deliberate scope limitation of this
//! component, not an oversight.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::lfu::{CacheStats, LfuCache, Loader};
use super::CacheConfig;
use crate::error::Result;
use crate::settings::{TenantId, TenantSettings};
use crate::store::SettingsStore;

/// Any settings store doubles as the engine's miss loader
#[async_trait]
impl<S> Loader<TenantId, TenantSettings> for Arc<S>
where
    S: SettingsStore + ?Sized,
{
    async fn load(&self, key: TenantId) -> Result<TenantSettings> {
        debug!(tenant = key, "settings cache miss, reading store");
        self.read(key).await
    }
}

/// LFU-cached view over a tenant settings store
pub struct TenantSettingsCache<S: SettingsStore + ?Sized> {
    cache: LfuCache<TenantId, TenantSettings, Arc<S>>,
    store: Arc<S>,
}

impl<S: SettingsStore + ?Sized> TenantSettingsCache<S> {
    /// Create a cache over the given store
    pub fn new(config: CacheConfig, store: Arc<S>) -> Result<Self> {
        Ok(Self {
            cache: LfuCache::new(config, Arc::clone(&store))?,
            store,
        })
    }

    /// Get a tenant's settings, reading the store on miss
    ///
    /// Never fails for a valid id: the store returns a default record for
    /// tenants with no stored configuration.
    pub async fn get(&self, id: TenantId) -> Result<TenantSettings> {
        self.cache.get(id).await
    }

    /// Update a tenant's command prefix, write-through
    ///
    /// The store write completes before the cached record is replaced;
    /// returns the new record.
    pub async fn update_prefix(
        &self,
        id: TenantId,
        prefix: impl Into<String>,
    ) -> Result<TenantSettings> {
        let current = self.get(id).await?;
        let updated = current.with_prefix(prefix);

        self.store.write_prefix(id, &updated.prefix).await?;
        self.cache.insert(id, updated.clone())?;

        debug!(tenant = id, prefix = %updated.prefix, "updated prefix");
        Ok(updated)
    }

    /// Update a tenant's admin role, write-through
    pub async fn update_admin_role(
        &self,
        id: TenantId,
        admin_role: Option<u64>,
    ) -> Result<TenantSettings> {
        let current = self.get(id).await?;
        let updated = current.with_admin_role(admin_role);

        self.store.write_admin_role(id, admin_role).await?;
        self.cache.insert(id, updated.clone())?;

        debug!(tenant = id, ?admin_role, "updated admin role");
        Ok(updated)
    }

    /// Drop a tenant's cached record, forcing the next read to hit the store
    pub fn invalidate(&self, id: TenantId) -> Result<Option<TenantSettings>> {
        self.cache.remove(&id)
    }

    /// Check whether a tenant's record is currently cached
    pub fn is_cached(&self, id: TenantId) -> bool {
        self.cache.contains(&id)
    }

    /// Number of tenants currently cached
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Snapshot of cache counters
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate internal cache structure, for tests and debugging
    pub fn check_invariants(&self) -> Result<()> {
        self.cache.check_invariants()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{InMemorySettingsStore, DEFAULT_PREFIX};
    use assert_matches::assert_matches;

    fn cache_with_store() -> (
        TenantSettingsCache<InMemorySettingsStore>,
        Arc<InMemorySettingsStore>,
    ) {
        let store = Arc::new(InMemorySettingsStore::new());
        let cache = TenantSettingsCache::new(
            CacheConfig {
                capacity: 4,
                evict_batch: 2,
            },
            Arc::clone(&store),
        )
        .unwrap();
        (cache, store)
    }

    #[tokio::test]
    async fn test_get_unconfigured_tenant_returns_default() {
        let (cache, _store) = cache_with_store();

        let settings = cache.get(1).await.unwrap();
        assert_eq!(settings.prefix, DEFAULT_PREFIX);
        assert_eq!(settings.admin_role, None);
        assert!(cache.is_cached(1));
    }

    #[tokio::test]
    async fn test_repeated_gets_hit_cache() {
        let (cache, store) = cache_with_store();

        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();

        assert_eq!(store.stats().reads, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_update_prefix_writes_store_then_cache() {
        let (cache, store) = cache_with_store();

        let updated = cache.update_prefix(1, "$").await.unwrap();
        assert_eq!(updated.prefix, "$");

        // Store holds the new value
        assert_eq!(store.read(1).await.unwrap().prefix, "$");
        // Cache serves it without another store read
        let reads_before = store.stats().reads;
        assert_eq!(cache.get(1).await.unwrap().prefix, "$");
        assert_eq!(store.stats().reads, reads_before);
    }

    #[tokio::test]
    async fn test_update_admin_role_preserves_prefix() {
        let (cache, _store) = cache_with_store();

        cache.update_prefix(1, "$").await.unwrap();
        let updated = cache.update_admin_role(1, Some(7)).await.unwrap();

        assert_eq!(updated.admin_role, Some(7));
        assert_eq!(updated.prefix, "$");
    }

    #[tokio::test]
    async fn test_external_store_write_is_not_observed() {
        let (cache, store) = cache_with_store();

        assert_eq!(cache.get(1).await.unwrap().prefix, DEFAULT_PREFIX);

        // Out-of-band write: the cached record stays stale by design
        store.write_prefix(1, "$").await.unwrap();
        assert_eq!(cache.get(1).await.unwrap().prefix, DEFAULT_PREFIX);

        // Until invalidated
        cache.invalidate(1).unwrap();
        assert_eq!(cache.get(1).await.unwrap().prefix, "$");
    }

    #[tokio::test]
    async fn test_failing_store_write_leaves_cache_unchanged() {
        struct ReadOnlyStore(InMemorySettingsStore);

        #[async_trait]
        impl SettingsStore for ReadOnlyStore {
            async fn read(&self, id: TenantId) -> Result<TenantSettings> {
                self.0.read(id).await
            }
            async fn write_prefix(&self, _id: TenantId, _prefix: &str) -> Result<()> {
                Err(Error::Store("write rejected".into()))
            }
            async fn write_admin_role(&self, _id: TenantId, _role: Option<u64>) -> Result<()> {
                Err(Error::Store("write rejected".into()))
            }
        }

        let store = Arc::new(ReadOnlyStore(InMemorySettingsStore::new()));
        let cache = TenantSettingsCache::new(CacheConfig::default(), store).unwrap();

        let before = cache.get(1).await.unwrap();
        assert_matches!(cache.update_prefix(1, "$").await, Err(Error::Store(_)));

        // The failed write must not touch the cached record
        assert_eq!(cache.get(1).await.unwrap(), before);
        cache.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_eviction_refetches_from_store() {
        let (cache, store) = cache_with_store();

        // Fill past capacity (4, batch 2) so early tenants age out
        for id in 1..=6 {
            cache.get(id).await.unwrap();
        }
        assert!(cache.len() <= 4);

        store.write_prefix(1, "$").await.unwrap();
        assert!(!cache.is_cached(1));

        // Evicted entry is re-fetched, picking up the store's value
        assert_eq!(cache.get(1).await.unwrap().prefix, "$");
    }
}
