//! Pure permission decision, shared by the access evaluator and tests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::membership::{Membership, MembershipStatus};
use crate::models::tenant::TenantStatus;

/// A permission check as accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
}

/// Why a check resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    TenantMissing,
    TenantInactive(TenantStatus),
    MembershipMissing,
    MembershipInactive(MembershipStatus),
    PermissionMissing,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

/// Union of permission slugs across the membership's roles.
pub fn effective_permissions(membership: &Membership) -> BTreeSet<String> {
    membership
        .roles
        .iter()
        .flat_map(|role| role.permissions.iter().map(|p| p.slug.clone()))
        .collect()
}

/// Decide a check from already-resolved state.
///
/// Absence never errors: a missing or inactive tenant or membership
/// simply grants nothing.
pub fn decide(
    tenant: Option<TenantStatus>,
    membership: Option<&Membership>,
    permission: &str,
) -> Decision {
    match tenant {
        None => return Decision::TenantMissing,
        Some(TenantStatus::Active) => {}
        Some(other) => return Decision::TenantInactive(other),
    }
    let Some(membership) = membership else {
        return Decision::MembershipMissing;
    };
    if membership.status != MembershipStatus::Active {
        return Decision::MembershipInactive(membership.status);
    }
    let granted = membership
        .roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .any(|p| p.slug == permission);
    if granted {
        Decision::Granted
    } else {
        Decision::PermissionMissing
    }
}
