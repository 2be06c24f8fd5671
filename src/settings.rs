//! Per-Tenant Settings Record
//!
//! The cached payload: a small immutable record of a tenant's configuration.
//! Updates never mutate in place; each write-through helper builds a new
//! record with one field replaced, so a reader holding a clone is never
//! surprised by a concurrent update.

use serde::{Deserialize, Serialize};

/// Numeric tenant identifier (snowflake-style)
pub type TenantId = u64;

/// A tenant's configuration record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Tenant this record belongs to
    pub id: TenantId,
    /// Command prefix for this tenant
    pub prefix: String,
    /// Role allowed to administer the tenant, if configured
    pub admin_role: Option<u64>,
}

impl TenantSettings {
    /// Create a record with the given prefix and no admin role
    pub fn new(id: TenantId, prefix: impl Into<String>) -> Self {
        Self {
            id,
            prefix: prefix.into(),
            admin_role: None,
        }
    }

    /// Copy of this record with the prefix replaced
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            id: self.id,
            prefix: prefix.into(),
            admin_role: self.admin_role,
        }
    }

    /// Copy of this record with the admin role replaced
    pub fn with_admin_role(&self, admin_role: Option<u64>) -> Self {
        Self {
            id: self.id,
            prefix: self.prefix.clone(),
            admin_role,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
