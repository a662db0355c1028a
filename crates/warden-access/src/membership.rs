//! Membership registry: invitations, lifecycle, and role assignment.

use tracing::{info, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::lifecycle::{MembershipAction, Transition};
use warden_core::models::membership::{
    AssignRoles, InviteMember, Membership, MembershipStatus, NewMembership,
};
use warden_core::models::role::Role;
use warden_core::models::tenant::TenantStatus;
use warden_core::repository::{
    MembershipRepository, PaginatedResult, Pagination, RoleRepository, TenantRepository,
    UserDirectory,
};
use warden_core::validation::{normalize_email, normalize_slug, require_id};

use crate::config::AccessConfig;
use crate::role::{dedup, first_missing};

/// Membership registry.
///
/// One live membership exists per (user, tenant) pair. A revoked one is
/// kept for audit and superseded when the pair is invited again.
pub struct MembershipRegistry<M, T, R, D>
where
    M: MembershipRepository,
    T: TenantRepository,
    R: RoleRepository,
    D: UserDirectory,
{
    memberships: M,
    tenants: T,
    roles: R,
    directory: D,
    config: AccessConfig,
}

impl<M, T, R, D> MembershipRegistry<M, T, R, D>
where
    M: MembershipRepository,
    T: TenantRepository,
    R: RoleRepository,
    D: UserDirectory,
{
    pub fn new(memberships: M, tenants: T, roles: R, directory: D, config: AccessConfig) -> Self {
        Self {
            memberships,
            tenants,
            roles,
            directory,
            config,
        }
    }

    /// Invite `email` into a tenant with roles resolved by slug, first
    /// among the tenant's roles and then among global ones.
    pub async fn invite_member(&self, input: InviteMember) -> WardenResult<Membership> {
        let tenant_id = require_id(input.tenant_id, "tenant_id")?;
        let email = normalize_email(&input.email)?;

        self.require_live_tenant(tenant_id).await?;

        let mut role_ids = Vec::with_capacity(input.role_slugs.len());
        for raw in &input.role_slugs {
            let role = self.resolve_role(tenant_id, &normalize_slug(raw)?).await?;
            role_ids.push(role.id);
        }
        let role_ids = dedup(role_ids);

        let user_id = self.directory.resolve_or_register(&email).await?;

        let supersedes = match self.memberships.find_for_user(tenant_id, user_id).await? {
            Some(existing) if existing.status == MembershipStatus::Revoked => Some(existing.id),
            Some(existing) => {
                return Err(WardenError::conflict(
                    "membership",
                    format!("{email} already has a {} membership", existing.status),
                ));
            }
            None => None,
        };

        let membership = self
            .memberships
            .create(NewMembership {
                tenant_id,
                user_id,
                email,
                role_ids,
                supersedes,
            })
            .await?;

        info!(
            membership_id = %membership.id,
            %tenant_id,
            %user_id,
            roles = membership.roles.len(),
            superseded = ?supersedes,
            "Member invited"
        );
        Ok(membership)
    }

    pub async fn activate_membership(&self, id: Uuid) -> WardenResult<Membership> {
        self.transition(id, MembershipAction::Activate).await
    }

    /// Revoke a membership. Roles stay attached for audit; repeating the
    /// revoke is a no-op unless `idempotent_revoke` is off.
    pub async fn revoke_membership(&self, id: Uuid) -> WardenResult<Membership> {
        self.transition(id, MembershipAction::Revoke).await
    }

    /// Replace the membership's full role set.
    ///
    /// Unknown role ids fail with `NotFound`; roles owned by another
    /// tenant fail with `CrossScope`. Global roles are allowed.
    pub async fn assign_roles_to_member(
        &self,
        id: Uuid,
        input: AssignRoles,
    ) -> WardenResult<Membership> {
        require_id(id, "membership_id")?;
        for role_id in &input.role_ids {
            require_id(*role_id, "role_id")?;
        }
        let role_ids = dedup(input.role_ids);

        let membership = self.memberships.get_by_id(id).await?;
        if membership.status == MembershipStatus::Revoked {
            return Err(WardenError::InvalidState {
                entity: "membership".into(),
                action: "assign roles to".into(),
                from: membership.status.to_string(),
            });
        }

        let roles = self.roles.get_many(&role_ids).await?;
        if let Some(missing) = first_missing(&role_ids, roles.iter().map(|r| r.id)) {
            return Err(WardenError::not_found("role", missing));
        }
        if let Some(foreign) = roles.iter().find(|r| !r.usable_in(membership.tenant_id)) {
            return Err(WardenError::CrossScope {
                message: format!(
                    "role {} belongs to tenant {}, membership {id} to tenant {}",
                    foreign.slug,
                    foreign.tenant_id.map(|t| t.to_string()).unwrap_or_default(),
                    membership.tenant_id
                ),
            });
        }

        let updated = self.memberships.replace_roles(id, role_ids).await?;
        info!(
            membership_id = %id,
            tenant_id = %updated.tenant_id,
            roles = updated.roles.len(),
            "Member roles replaced"
        );
        Ok(updated)
    }

    pub async fn get_membership(&self, id: Uuid) -> WardenResult<Membership> {
        require_id(id, "membership_id")?;
        self.memberships.get_by_id(id).await
    }

    /// The live membership of `user_id` in `tenant_id`.
    pub async fn get_membership_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> WardenResult<Membership> {
        require_id(tenant_id, "tenant_id")?;
        require_id(user_id, "user_id")?;
        self.memberships
            .find_for_user(tenant_id, user_id)
            .await?
            .ok_or_else(|| WardenError::not_found("membership", format!("{tenant_id}:{user_id}")))
    }

    pub async fn list_memberships(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<Membership>> {
        require_id(tenant_id, "tenant_id")?;
        self.tenants.get_by_id(tenant_id).await?;
        self.memberships.list_by_tenant(tenant_id, pagination).await
    }

    async fn require_live_tenant(&self, tenant_id: Uuid) -> WardenResult<()> {
        let tenant = self.tenants.get_by_id(tenant_id).await?;
        if tenant.status == TenantStatus::Deleted {
            return Err(WardenError::not_found("tenant", tenant_id));
        }
        Ok(())
    }

    async fn resolve_role(&self, tenant_id: Uuid, slug: &str) -> WardenResult<Role> {
        match self.roles.get_by_slug(Some(tenant_id), slug).await {
            Err(WardenError::NotFound { .. }) => {}
            other => return other,
        }
        match self.roles.get_by_slug(None, slug).await {
            Err(WardenError::NotFound { .. }) => Err(WardenError::not_found("role", slug)),
            other => other,
        }
    }

    async fn transition(&self, id: Uuid, action: MembershipAction) -> WardenResult<Membership> {
        require_id(id, "membership_id")?;

        for attempt in 0..=self.config.max_transition_retries {
            let current = self.memberships.get_by_id(id).await?;
            let next = match current.status.apply(action)? {
                Transition::To(next) => next,
                Transition::Unchanged if self.config.idempotent_revoke => {
                    info!(membership_id = %id, "Membership already revoked");
                    return Ok(current);
                }
                Transition::Unchanged => {
                    return Err(WardenError::InvalidState {
                        entity: "membership".into(),
                        action: action.as_str().into(),
                        from: current.status.to_string(),
                    });
                }
            };

            if let Some(updated) = self
                .memberships
                .compare_and_set_status(id, current.status, next)
                .await?
            {
                info!(
                    membership_id = %id,
                    tenant_id = %updated.tenant_id,
                    from = %current.status,
                    status = %updated.status,
                    "Membership status changed"
                );
                return Ok(updated);
            }

            warn!(
                membership_id = %id,
                attempt,
                action = action.as_str(),
                "Membership status changed concurrently, retrying"
            );
        }

        Err(WardenError::conflict(
            "membership",
            format!(
                "status of {id} kept changing during {}; retry later",
                action.as_str()
            ),
        ))
    }
}
