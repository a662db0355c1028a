//! Membership domain model.
//!
//! A membership binds one user to one tenant. Only one live membership
//! exists per `(user_id, tenant_id)` pair; a revoked membership that is
//! re-invited is kept as a superseded audit record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use crate::error::WardenError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Active,
    /// Terminal. Roles are retained for audit but grant nothing.
    Revoked,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "active" => Ok(MembershipStatus::Active),
            "revoked" => Ok(MembershipStatus::Revoked),
            other => Err(WardenError::invalid_argument(format!(
                "unknown membership status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Denormalized for display.
    pub email: String,
    pub status: MembershipStatus,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn role_ids(&self) -> Vec<Uuid> {
        self.roles.iter().map(|r| r.id).collect()
    }
}

/// Invite request as accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteMember {
    pub tenant_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role_slugs: Vec<String>,
}

/// Storage-ready membership, with the user and roles already resolved.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role_ids: Vec<Uuid>,
    /// Revoked membership of the same pair to retire in the same write.
    pub supersedes: Option<Uuid>,
}

/// Replacement role set for a membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoles {
    pub role_ids: Vec<Uuid>,
}
