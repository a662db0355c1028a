//! Permission domain model.
//!
//! Permissions are catalog data: created administratively, never updated
//! or deleted by this core, and referenced by roles through their id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    /// Globally unique capability name (e.g., `catalog.read`).
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub name: String,
    pub slug: String,
}
