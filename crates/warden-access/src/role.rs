//! Role and permission store.

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{CreatePermission, Permission};
use warden_core::models::role::{CreateRole, Role};
use warden_core::repository::{PermissionRepository, RoleRepository};
use warden_core::validation::{normalize_permission_slug, normalize_slug, require_id, require_text};

/// Role and permission store.
///
/// Permissions are catalog data: they can be registered and read but
/// never changed once created.
pub struct RoleStore<R: RoleRepository, P: PermissionRepository> {
    roles: R,
    permissions: P,
}

impl<R: RoleRepository, P: PermissionRepository> RoleStore<R, P> {
    pub fn new(roles: R, permissions: P) -> Self {
        Self { roles, permissions }
    }

    /// Create a role in a tenant, or a global role when `tenant_id` is
    /// `None`. Every permission id must exist.
    pub async fn create_role(&self, input: CreateRole) -> WardenResult<Role> {
        if let Some(tenant_id) = input.tenant_id {
            require_id(tenant_id, "tenant_id")?;
        }
        let name = require_text(&input.name, "name")?;
        let slug = normalize_slug(&input.slug)?;
        let permission_ids = dedup(input.permission_ids);

        let found = self.permissions.get_many(&permission_ids).await?;
        if let Some(missing) = first_missing(&permission_ids, found.iter().map(|p| p.id)) {
            return Err(WardenError::not_found("permission", missing));
        }

        let role = self
            .roles
            .create(CreateRole {
                tenant_id: input.tenant_id,
                name,
                slug,
                permission_ids,
            })
            .await?;

        info!(
            role_id = %role.id,
            tenant_id = ?role.tenant_id,
            slug = %role.slug,
            permissions = role.permissions.len(),
            "Role created"
        );
        Ok(role)
    }

    /// Tenant-scoped roles followed by global roles.
    pub async fn list_roles(&self, tenant_id: Uuid) -> WardenResult<Vec<Role>> {
        require_id(tenant_id, "tenant_id")?;
        self.roles.list_for_tenant(tenant_id).await
    }

    pub async fn get_role(&self, id: Uuid) -> WardenResult<Role> {
        require_id(id, "role_id")?;
        self.roles.get_by_id(id).await
    }

    pub async fn register_permission(&self, input: CreatePermission) -> WardenResult<Permission> {
        let name = require_text(&input.name, "name")?;
        let slug = normalize_permission_slug(&input.slug)?;

        let permission = self.permissions.create(CreatePermission { name, slug }).await?;
        info!(permission_id = %permission.id, slug = %permission.slug, "Permission registered");
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> WardenResult<Vec<Permission>> {
        self.permissions.list().await
    }

    pub async fn get_permission_by_slug(&self, slug: &str) -> WardenResult<Permission> {
        let slug = normalize_permission_slug(slug)?;
        self.permissions.get_by_slug(&slug).await
    }
}

/// Drop repeated ids, keeping first-seen order.
pub(crate) fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// First requested id absent from `found`.
pub(crate) fn first_missing(
    requested: &[Uuid],
    found: impl IntoIterator<Item = Uuid>,
) -> Option<Uuid> {
    let found: BTreeSet<Uuid> = found.into_iter().collect();
    requested.iter().copied().find(|id| !found.contains(id))
}
