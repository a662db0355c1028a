//! Access evaluator: answers permission checks from current state.

use std::collections::BTreeSet;

use tracing::debug;
use uuid::Uuid;
use warden_core::access::{PermissionCheck, decide, effective_permissions};
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::membership::{Membership, MembershipStatus};
use warden_core::models::tenant::TenantStatus;
use warden_core::repository::{MembershipRepository, TenantRepository};
use warden_core::validation::{require_id, require_text};

/// Read-only permission evaluator.
///
/// Absence never errors: an unknown or inactive tenant or membership
/// grants nothing. Only malformed input fails.
pub struct AccessEvaluator<T: TenantRepository, M: MembershipRepository> {
    tenants: T,
    memberships: M,
}

impl<T: TenantRepository, M: MembershipRepository> AccessEvaluator<T, M> {
    pub fn new(tenants: T, memberships: M) -> Self {
        Self {
            tenants,
            memberships,
        }
    }

    pub async fn check_permission(&self, check: &PermissionCheck) -> WardenResult<bool> {
        require_id(check.tenant_id, "tenant_id")?;
        require_id(check.user_id, "user_id")?;
        let permission = require_text(&check.permission, "permission")?;

        let tenant = self.tenant_status(check.tenant_id).await?;
        let membership = match tenant {
            Some(TenantStatus::Active) => {
                self.memberships
                    .find_for_user(check.tenant_id, check.user_id)
                    .await?
            }
            _ => None,
        };

        let decision = decide(tenant, membership.as_ref(), &permission);
        debug!(
            tenant_id = %check.tenant_id,
            user_id = %check.user_id,
            %permission,
            decision = ?decision,
            "Permission check"
        );
        Ok(decision.is_granted())
    }

    /// The sorted permission slugs `check_permission` tests against.
    pub async fn effective_permissions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> WardenResult<BTreeSet<String>> {
        require_id(tenant_id, "tenant_id")?;
        require_id(user_id, "user_id")?;

        if self.tenant_status(tenant_id).await? != Some(TenantStatus::Active) {
            return Ok(BTreeSet::new());
        }
        let membership: Option<Membership> =
            self.memberships.find_for_user(tenant_id, user_id).await?;
        Ok(match membership {
            Some(m) if m.status == MembershipStatus::Active => effective_permissions(&m),
            _ => BTreeSet::new(),
        })
    }

    async fn tenant_status(&self, tenant_id: Uuid) -> WardenResult<Option<TenantStatus>> {
        match self.tenants.get_by_id(tenant_id).await {
            Ok(tenant) => Ok(Some(tenant.status)),
            Err(WardenError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
