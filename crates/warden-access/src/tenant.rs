//! Tenant registry: creation, lifecycle, and domain management.

use tracing::{info, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::lifecycle::{TenantAction, Transition};
use warden_core::models::tenant::{
    AddDomain, CreateTenant, Domain, NewTenant, Tenant, TenantStatus, schema_name_for,
};
use warden_core::repository::{PaginatedResult, Pagination, TenantRepository};
use warden_core::validation::{normalize_hostname, normalize_slug, require_id, require_text};

use crate::config::AccessConfig;

/// Tenant registry.
///
/// Status changes are read, checked against the state machine, then
/// written with compare-and-swap; a lost race re-reads and re-checks.
pub struct TenantRegistry<T: TenantRepository> {
    tenants: T,
    config: AccessConfig,
}

impl<T: TenantRepository> TenantRegistry<T> {
    pub fn new(tenants: T, config: AccessConfig) -> Self {
        Self { tenants, config }
    }

    /// Create an active tenant with `domain` as its primary domain.
    pub async fn create_tenant(&self, input: CreateTenant) -> WardenResult<Tenant> {
        let name = require_text(&input.name, "name")?;
        let slug = normalize_slug(&input.slug)?;
        let hostname = normalize_hostname(&input.domain)?;

        let tenant = self
            .tenants
            .create(NewTenant {
                name,
                schema_name: schema_name_for(&self.config.schema_prefix, &slug),
                slug,
                primary_hostname: hostname,
            })
            .await?;

        info!(
            tenant_id = %tenant.id,
            slug = %tenant.slug,
            schema_name = %tenant.schema_name,
            "Tenant created"
        );
        Ok(tenant)
    }

    pub async fn activate_tenant(&self, id: Uuid) -> WardenResult<Tenant> {
        self.transition(id, TenantAction::Activate).await
    }

    pub async fn suspend_tenant(&self, id: Uuid) -> WardenResult<Tenant> {
        self.transition(id, TenantAction::Suspend).await
    }

    /// Delete a tenant. Irreversible; repeating it is a no-op unless
    /// `idempotent_delete` is off.
    pub async fn delete_tenant(&self, id: Uuid) -> WardenResult<Tenant> {
        self.transition(id, TenantAction::Delete).await
    }

    pub async fn add_domain(&self, id: Uuid, input: AddDomain) -> WardenResult<Domain> {
        require_id(id, "tenant_id")?;
        let hostname = normalize_hostname(&input.hostname)?;

        let domain = self
            .tenants
            .add_domain(id, hostname, input.is_primary)
            .await?;

        info!(
            tenant_id = %id,
            hostname = %domain.hostname,
            is_primary = domain.is_primary,
            "Domain added"
        );
        Ok(domain)
    }

    pub async fn get_tenant(&self, id: Uuid) -> WardenResult<Tenant> {
        require_id(id, "tenant_id")?;
        self.tenants.get_by_id(id).await
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> WardenResult<Tenant> {
        let slug = normalize_slug(slug)?;
        self.tenants.get_by_slug(&slug).await
    }

    /// The tenant owning `hostname`, whatever its status.
    pub async fn resolve_tenant_by_host(&self, hostname: &str) -> WardenResult<Tenant> {
        let hostname = normalize_hostname(hostname)?;
        self.tenants.get_by_hostname(&hostname).await
    }

    pub async fn list_tenants(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<Tenant>> {
        self.tenants.list(status, pagination).await
    }

    pub async fn list_domains(&self, id: Uuid) -> WardenResult<Vec<Domain>> {
        // Surface NotFound for unknown tenants instead of an empty list.
        let tenant = self.get_tenant(id).await?;
        Ok(tenant.domains)
    }

    async fn transition(&self, id: Uuid, action: TenantAction) -> WardenResult<Tenant> {
        require_id(id, "tenant_id")?;

        for attempt in 0..=self.config.max_transition_retries {
            let current = self.tenants.get_by_id(id).await?;
            let next = match current.status.apply(action)? {
                Transition::To(next) => next,
                Transition::Unchanged if self.config.idempotent_delete => {
                    info!(tenant_id = %id, status = %current.status, "Tenant already deleted");
                    return Ok(current);
                }
                Transition::Unchanged => {
                    return Err(WardenError::InvalidState {
                        entity: "tenant".into(),
                        action: action.as_str().into(),
                        from: current.status.to_string(),
                    });
                }
            };

            if let Some(updated) = self
                .tenants
                .compare_and_set_status(id, current.status, next)
                .await?
            {
                info!(
                    tenant_id = %id,
                    from = %current.status,
                    status = %updated.status,
                    "Tenant status changed"
                );
                return Ok(updated);
            }

            warn!(
                tenant_id = %id,
                attempt,
                action = action.as_str(),
                "Tenant status changed concurrently, retrying"
            );
        }

        Err(WardenError::conflict(
            "tenant",
            format!(
                "status of {id} kept changing during {}; retry later",
                action.as_str()
            ),
        ))
    }
}
