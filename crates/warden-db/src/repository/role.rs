//! SurrealDB implementation of [`RoleRepository`].
//!
//! Role slugs are unique per `scope_key`: the owning tenant's id, or
//! `global` for roles shared by every tenant. Permissions hang off
//! `grants` edges.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::role::{CreateRole, Role, scope_key};
use warden_core::models::tenant::TenantStatus;
use warden_core::repository::RoleRepository;

use crate::error::{DbError, parse_uuid};
use crate::repository::permission::role_permissions;
use crate::repository::tx::{self, TENANT_GUARD};

#[derive(Debug, SurrealValue)]
struct RoleRow {
    tenant_id: Option<String>,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
pub(crate) struct RoleRowWithId {
    record_id: String,
    tenant_id: Option<String>,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct StatusRow {
    status: String,
}

impl RoleRow {
    fn into_role(self, id: Uuid) -> Result<Role, DbError> {
        Ok(Role {
            id,
            tenant_id: self
                .tenant_id
                .as_deref()
                .map(|t| parse_uuid(t, "tenant"))
                .transpose()?,
            name: self.name,
            slug: self.slug,
            permissions: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        let id = parse_uuid(&self.record_id, "role")?;
        RoleRow {
            tenant_id: self.tenant_id,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_role(id)
    }
}

/// Convert rows to roles with their permissions resolved.
pub(crate) async fn hydrate_roles<C: Connection>(
    db: &Surreal<C>,
    rows: Vec<RoleRowWithId>,
) -> Result<Vec<Role>, DbError> {
    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        let mut role = row.try_into_role()?;
        role.permissions = role_permissions(db, role.id).await?;
        roles.push(role);
    }
    Ok(roles)
}

/// Roles attached to a membership through `has_role` edges.
pub(crate) async fn membership_roles<C: Connection>(
    db: &Surreal<C>,
    membership_id: Uuid,
) -> Result<Vec<Role>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM role \
             WHERE id IN (\
                 SELECT VALUE out FROM has_role \
                 WHERE in = type::record('membership', $membership_id)\
             ) \
             ORDER BY slug ASC",
        )
        .bind(("membership_id", membership_id.to_string()))
        .await?;

    let rows: Vec<RoleRowWithId> = result.take(0)?;
    hydrate_roles(db, rows).await
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_slug(&self, tenant_id: Option<Uuid>, slug: &str) -> Result<Option<Role>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE scope_key = $scope_key AND slug = $slug",
            )
            .bind(("scope_key", scope_key(tenant_id)))
            .bind(("slug", slug.to_string()))
            .await?;

        let rows: Vec<RoleRowWithId> = result.take(0)?;
        Ok(hydrate_roles(&self.db, rows).await?.into_iter().next())
    }

    /// Explain a rejected create by re-reading the owning tenant and the
    /// slug. `None` means the write can be retried.
    async fn diagnose_create(&self, input: &CreateRole) -> WardenResult<Option<WardenError>> {
        if let Some(tenant_id) = input.tenant_id {
            let mut result = self
                .db
                .query("SELECT status FROM type::record('tenant', $id)")
                .bind(("id", tenant_id.to_string()))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<StatusRow> = result.take(0).map_err(DbError::from)?;
            let live = rows
                .first()
                .is_some_and(|r| r.status != TenantStatus::Deleted.as_str());
            if !live {
                return Ok(Some(WardenError::not_found("tenant", tenant_id)));
            }
        }
        if self.find_by_slug(input.tenant_id, &input.slug).await?.is_some() {
            return Ok(Some(WardenError::conflict(
                "role",
                format!("slug {} already exists in scope {}", input.slug, scope_key(input.tenant_id)),
            )));
        }
        Ok(None)
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> WardenResult<Role> {
        let id = Uuid::new_v4();

        let mut statements = Vec::new();
        if input.tenant_id.is_some() {
            statements.push(TENANT_GUARD.to_string());
        }
        statements.push(
            "CREATE type::record('role', $id) SET \
             tenant_id = $tenant_id, scope_key = $scope_key, \
             name = $name, slug = $slug;"
                .to_string(),
        );
        statements.extend(tx::relate_all(
            "role",
            id,
            "grants",
            "permission",
            &input.permission_ids,
        ));

        let query = tx::transaction(statements);
        let mut last_error = String::new();

        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }

            let outcome = self
                .db
                .query(query.clone())
                .bind(("id", id.to_string()))
                .bind(("tenant_id", input.tenant_id.map(|t| t.to_string())))
                .bind(("scope_key", scope_key(input.tenant_id)))
                .bind(("name", input.name.clone()))
                .bind(("slug", input.slug.clone()))
                .await
                .and_then(|response| response.check());

            let Err(e) = outcome else {
                return self.get_by_id(id).await;
            };
            last_error = e.to_string();
            debug!(slug = %input.slug, attempt, error = %last_error, "Role create transaction rejected");
            if let Some(err) = self.diagnose_create(&input).await? {
                return Err(err);
            }
        }

        warn!(slug = %input.slug, error = %last_error, "Role create gave up after retries");
        Err(DbError::contention("role", last_error).into())
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('role', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id_str))?;

        let mut role = row.into_role(id)?;
        role.permissions = role_permissions(&self.db, id).await?;
        Ok(role)
    }

    async fn get_by_slug(&self, tenant_id: Option<Uuid>, slug: &str) -> WardenResult<Role> {
        self.find_by_slug(tenant_id, slug).await?.ok_or_else(|| {
            WardenError::not_found("role", format!("{}/{slug}", scope_key(tenant_id)))
        })
    }

    async fn get_many(&self, ids: &[Uuid]) -> WardenResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE meta::id(id) IN $ids ORDER BY slug ASC",
            )
            .bind(("ids", tx::id_strings(ids)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(hydrate_roles(&self.db, rows).await?)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> WardenResult<Vec<Role>> {
        // Statement 0 is the tenant's own roles, statement 1 the global ones.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE scope_key = $scope_key ORDER BY slug ASC; \
                 SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE scope_key = 'global' ORDER BY slug ASC;",
            )
            .bind(("scope_key", scope_key(Some(tenant_id))))
            .await
            .map_err(DbError::from)?;

        let scoped: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let global: Vec<RoleRowWithId> = result.take(1).map_err(DbError::from)?;

        let rows = scoped.into_iter().chain(global).collect();
        Ok(hydrate_roles(&self.db, rows).await?)
    }
}
