//! Tenant domain model.
//!
//! Tenants are the unit of isolation. Every membership and every
//! tenant-local role is scoped to exactly one tenant.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WardenError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    /// Terminal. The record is retained but no longer mutable.
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "deleted" => Ok(TenantStatus::Deleted),
            other => Err(WardenError::invalid_argument(format!(
                "unknown tenant status: {other}"
            ))),
        }
    }
}

/// A hostname routed to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub hostname: String,
    /// At most one domain per tenant carries this flag.
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Globally unique, normalized at creation and immutable afterwards.
    pub slug: String,
    /// Storage namespace identifier allocated at creation.
    pub schema_name: String,
    pub status: TenantStatus,
    /// Ordered by creation.
    pub domains: Vec<Domain>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn primary_domain(&self) -> Option<&Domain> {
        self.domains.iter().find(|d| d.is_primary)
    }
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    /// Becomes the tenant's primary domain.
    pub domain: String,
}

/// Storage-ready tenant record, already normalized by the registry.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub primary_hostname: String,
}

/// Fields required to attach a domain to an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDomain {
    pub hostname: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Derive the storage namespace for a normalized slug.
///
/// Slugs only contain `[a-z0-9-]` and are globally unique, so replacing
/// hyphens with underscores keeps the result unique and a valid SQL
/// identifier.
pub fn schema_name_for(prefix: &str, slug: &str) -> String {
    format!("{prefix}{}", slug.replace('-', "_"))
}
