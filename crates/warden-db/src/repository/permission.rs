//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{CreatePermission, Permission};
use warden_core::repository::PermissionRepository;

use crate::error::{DbError, parse_uuid};
use crate::repository::tx;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
pub(crate) struct PermissionRowWithId {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

impl PermissionRowWithId {
    pub(crate) fn try_into_permission(self) -> Result<Permission, DbError> {
        Ok(Permission {
            id: parse_uuid(&self.record_id, "permission")?,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
        })
    }
}

/// Permissions granted to a role through `grants` edges, by slug.
pub(crate) async fn role_permissions<C: Connection>(
    db: &Surreal<C>,
    role_id: Uuid,
) -> Result<Vec<Permission>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM permission \
             WHERE id IN (\
                 SELECT VALUE out FROM grants \
                 WHERE in = type::record('role', $role_id)\
             ) \
             ORDER BY slug ASC",
        )
        .bind(("role_id", role_id.to_string()))
        .await?;

    let rows: Vec<PermissionRowWithId> = result.take(0)?;
    rows.into_iter()
        .map(PermissionRowWithId::try_into_permission)
        .collect()
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Permission>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM permission WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await?;

        let rows: Vec<PermissionRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(PermissionRowWithId::try_into_permission)
            .transpose()
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> WardenResult<Permission> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut last_error = String::new();

        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }

            let outcome = self
                .db
                .query(
                    "CREATE type::record('permission', $id) SET \
                     name = $name, slug = $slug",
                )
                .bind(("id", id_str.clone()))
                .bind(("name", input.name.clone()))
                .bind(("slug", input.slug.clone()))
                .await
                .and_then(|response| response.check());

            let mut result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    last_error = e.to_string();
                    debug!(slug = %input.slug, attempt, error = %last_error, "Permission create rejected");
                    if self.find_by_slug(&input.slug).await?.is_some() {
                        return Err(WardenError::conflict(
                            "permission",
                            format!("slug {} is already registered", input.slug),
                        ));
                    }
                    continue;
                }
            };

            let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
            let row = rows
                .into_iter()
                .next()
                .ok_or_else(|| DbError::not_found("permission", id))?;

            return Ok(Permission {
                id,
                name: row.name,
                slug: row.slug,
                created_at: row.created_at,
            });
        }

        warn!(slug = %input.slug, error = %last_error, "Permission create gave up after retries");
        Err(DbError::contention("permission", last_error).into())
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Permission> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id_str))?;

        Ok(Permission {
            id,
            name: row.name,
            slug: row.slug,
            created_at: row.created_at,
        })
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Permission> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| WardenError::not_found("permission", format!("slug={slug}")))
    }

    async fn get_many(&self, ids: &[Uuid]) -> WardenResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE meta::id(id) IN $ids ORDER BY slug ASC",
            )
            .bind(("ids", tx::id_strings(ids)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn list(&self) -> WardenResult<Vec<Permission>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM permission ORDER BY slug ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
