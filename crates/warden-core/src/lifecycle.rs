//! Lifecycle state machines for tenants and memberships.
//!
//! ```text
//! tenant:      active <-> suspended,  {active, suspended} -> deleted
//! membership:  pending -> active,     {pending, active}   -> revoked
//! ```
//!
//! `deleted` and `revoked` are terminal. Repeating the terminal action on
//! a terminal record yields [`Transition::Unchanged`] so callers can
//! decide whether to treat it as an idempotent success.

use crate::error::WardenError;
use crate::models::membership::MembershipStatus;
use crate::models::tenant::TenantStatus;

/// Outcome of applying an action to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    To(S),
    /// The record already sits in the action's target terminal state.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantAction {
    Activate,
    Suspend,
    Delete,
}

impl TenantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantAction::Activate => "activate",
            TenantAction::Suspend => "suspend",
            TenantAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Activate,
    Revoke,
}

impl MembershipAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipAction::Activate => "activate",
            MembershipAction::Revoke => "revoke",
        }
    }
}

impl TenantStatus {
    pub fn apply(self, action: TenantAction) -> Result<Transition<TenantStatus>, WardenError> {
        use TenantAction::*;
        use TenantStatus::*;

        match (self, action) {
            (Suspended, Activate) => Ok(Transition::To(Active)),
            (Active, Suspend) => Ok(Transition::To(Suspended)),
            (Active | Suspended, Delete) => Ok(Transition::To(Deleted)),
            (Deleted, Delete) => Ok(Transition::Unchanged),
            (from, action) => Err(invalid("tenant", action.as_str(), from.as_str())),
        }
    }
}

impl MembershipStatus {
    pub fn apply(
        self,
        action: MembershipAction,
    ) -> Result<Transition<MembershipStatus>, WardenError> {
        use MembershipAction::*;
        use MembershipStatus::*;

        match (self, action) {
            (Pending, Activate) => Ok(Transition::To(Active)),
            (Pending | Active, Revoke) => Ok(Transition::To(Revoked)),
            (Revoked, Revoke) => Ok(Transition::Unchanged),
            (from, action) => Err(invalid("membership", action.as_str(), from.as_str())),
        }
    }
}

fn invalid(entity: &str, action: &str, from: &str) -> WardenError {
    WardenError::InvalidState {
        entity: entity.into(),
        action: action.into(),
        from: from.into(),
    }
}
