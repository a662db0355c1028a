//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations own the
//! transactional boundaries: every method either applies completely or
//! not at all, and status changes are compare-and-swap.

use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    membership::{Membership, MembershipStatus, NewMembership},
    permission::{CreatePermission, Permission},
    role::{CreateRole, Role},
    tenant::{Domain, NewTenant, Tenant, TenantStatus},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants & domains
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    /// Create the tenant together with its primary domain.
    fn create(&self, input: NewTenant) -> impl Future<Output = WardenResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Tenant>> + Send;
    /// Resolve the tenant owning a (normalized) hostname.
    fn get_by_hostname(&self, hostname: &str)
    -> impl Future<Output = WardenResult<Tenant>> + Send;
    fn list(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Tenant>>> + Send;

    /// Set `status = next` only if the stored status still equals
    /// `expected`. Returns `None` when another writer got there first.
    fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TenantStatus,
        next: TenantStatus,
    ) -> impl Future<Output = WardenResult<Option<Tenant>>> + Send;

    /// Attach a domain. A primary domain demotes the tenant's current
    /// primary in the same transaction.
    fn add_domain(
        &self,
        tenant_id: Uuid,
        hostname: String,
        is_primary: bool,
    ) -> impl Future<Output = WardenResult<Domain>> + Send;
    fn list_domains(&self, tenant_id: Uuid)
    -> impl Future<Output = WardenResult<Vec<Domain>>> + Send;
}

// ---------------------------------------------------------------------------
// Permission catalog & roles
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Permission>> + Send;
    /// Fetch the subset of `ids` that exist.
    fn get_many(&self, ids: &[Uuid])
    -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
    fn list(&self) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    /// Create the role and its permission grants in one transaction.
    fn create(&self, input: CreateRole) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Look up a role by slug within one scope (`None` = global).
    fn get_by_slug(
        &self,
        tenant_id: Option<Uuid>,
        slug: &str,
    ) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Fetch the subset of `ids` that exist.
    fn get_many(&self, ids: &[Uuid]) -> impl Future<Output = WardenResult<Vec<Role>>> + Send;
    /// Tenant-scoped roles followed by global roles.
    fn list_for_tenant(&self, tenant_id: Uuid)
    -> impl Future<Output = WardenResult<Vec<Role>>> + Send;
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

pub trait MembershipRepository: Send + Sync {
    /// Create a pending membership. Fails with `NotFound` if the tenant
    /// is missing or deleted at commit time and with `Conflict` if a live
    /// membership already exists for the pair.
    fn create(
        &self,
        input: NewMembership,
    ) -> impl Future<Output = WardenResult<Membership>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Membership>> + Send;
    /// The live (non-superseded) membership of a user in a tenant.
    fn find_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = WardenResult<Option<Membership>>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Membership>>> + Send;
    fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: MembershipStatus,
        next: MembershipStatus,
    ) -> impl Future<Output = WardenResult<Option<Membership>>> + Send;
    /// Replace the full role set. Fails with `InvalidState` on a revoked
    /// membership.
    fn replace_roles(
        &self,
        id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> impl Future<Output = WardenResult<Membership>> + Send;
}

// ---------------------------------------------------------------------------
// Identity directory (external collaborator)
// ---------------------------------------------------------------------------

/// Maps invited email addresses to stable user ids.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str)
    -> impl Future<Output = WardenResult<Option<Uuid>>> + Send;
    /// Return the user id for `email`, registering it on first sight.
    fn resolve_or_register(&self, email: &str) -> impl Future<Output = WardenResult<Uuid>> + Send;
}
