//! Backing Store Boundary
//!
//! Abstract asynchronous store for tenant settings. The cache only requires a
//! read that resolves every valid id (unknown tenants yield a default record,
//! never an error) and per-field upsert writes that complete, or fail, before
//! the in-memory copy is touched.
//!
//! # Design
//!
//! - Pluggable backend (SQL pool, KV store, etc.) behind an async trait
//! - Reads never distinguish "unconfigured" from "configured with defaults"
//! - Writes are upserts: writing one field for an unknown id creates the row

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::settings::{TenantId, TenantSettings};

/// Default command prefix for tenants with no stored configuration
pub const DEFAULT_PREFIX: &str = "!";

/// Settings store trait
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the settings record for a tenant
    ///
    /// Must not fail for a valid-but-unconfigured id; backends return a
    /// default record instead.
    async fn read(&self, id: TenantId) -> Result<TenantSettings>;

    /// Upsert the command prefix for a tenant
    async fn write_prefix(&self, id: TenantId, prefix: &str) -> Result<()>;

    /// Upsert the admin role for a tenant
    async fn write_admin_role(&self, id: TenantId, admin_role: Option<u64>) -> Result<()>;
}

/// Store operation counters
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
}

/// In-memory settings store
///
/// Uses DashMap for lock-free concurrent access. Serves as the reference
/// backend for tests and small deployments.
pub struct InMemorySettingsStore {
    /// Records by tenant id
    records: DashMap<TenantId, TenantSettings>,
    /// Prefix handed out for unknown tenants
    default_prefix: String,
    /// Read operation count
    reads: AtomicU64,
    /// Write operation count
    writes: AtomicU64,
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySettingsStore {
    /// Create a store with the standard default prefix
    pub fn new() -> Self {
        Self::with_default_prefix(DEFAULT_PREFIX)
    }

    /// Create a store with a custom default prefix
    pub fn with_default_prefix(default_prefix: impl Into<String>) -> Self {
        Self {
            records: DashMap::new(),
            default_prefix: default_prefix.into(),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of tenants with stored configuration
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no configuration is stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get operation counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    fn default_record(&self, id: TenantId) -> TenantSettings {
        TenantSettings::new(id, self.default_prefix.clone())
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn read(&self, id: TenantId) -> Result<TenantSettings> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        match self.records.get(&id) {
            Some(record) => Ok(record.clone()),
            None => {
                debug!(tenant = id, "no stored settings, returning defaults");
                Ok(self.default_record(id))
            }
        }
    }

    async fn write_prefix(&self, id: TenantId, prefix: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        // Upsert: writing a field for an unknown tenant creates the record
        self.records
            .entry(id)
            .and_modify(|record| record.prefix = prefix.to_string())
            .or_insert_with(|| TenantSettings::new(id, prefix));
        Ok(())
    }

    async fn write_admin_role(&self, id: TenantId, admin_role: Option<u64>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        let default_prefix = self.default_prefix.clone();
        self.records
            .entry(id)
            .and_modify(|record| record.admin_role = admin_role)
            .or_insert_with(|| TenantSettings {
                id,
                prefix: default_prefix,
                admin_role,
            });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
