//! SurrealDB implementation of [`TenantRepository`].
//!
//! Domains live in their own table keyed by `tenant_id` and are loaded
//! alongside every tenant read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::tenant::{Domain, NewTenant, Tenant, TenantStatus};
use warden_core::repository::{PaginatedResult, Pagination, TenantRepository};

use crate::error::{DbError, parse_uuid};
use crate::repository::tx::{self, TENANT_GUARD};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    slug: String,
    schema_name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    name: String,
    slug: String,
    schema_name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct DomainRow {
    tenant_id: String,
    hostname: String,
    is_primary: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct DomainRowWithId {
    record_id: String,
    tenant_id: String,
    hostname: String,
    is_primary: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(raw: &str) -> Result<TenantStatus, DbError> {
    raw.parse()
        .map_err(|_| DbError::Corrupt(format!("unknown tenant status: {raw}")))
}

impl TenantRow {
    fn into_tenant(self, id: Uuid, domains: Vec<Domain>) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id,
            name: self.name,
            slug: self.slug,
            schema_name: self.schema_name,
            status: parse_status(&self.status)?,
            domains,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TenantRowWithId {
    fn tenant_id(&self) -> Result<Uuid, DbError> {
        parse_uuid(&self.record_id, "tenant")
    }

    fn try_into_tenant(self, domains: Vec<Domain>) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: self.tenant_id()?,
            name: self.name,
            slug: self.slug,
            schema_name: self.schema_name,
            status: parse_status(&self.status)?,
            domains,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DomainRow {
    fn into_domain(self, id: Uuid) -> Result<Domain, DbError> {
        Ok(Domain {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            hostname: self.hostname,
            is_primary: self.is_primary,
            created_at: self.created_at,
        })
    }
}

impl DomainRowWithId {
    fn try_into_domain(self) -> Result<Domain, DbError> {
        Ok(Domain {
            id: parse_uuid(&self.record_id, "domain")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            hostname: self.hostname,
            is_primary: self.is_primary,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Domains for each of `tenant_ids`, in creation order.
    async fn load_domains(&self, tenant_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Domain>>, DbError> {
        let mut grouped: HashMap<Uuid, Vec<Domain>> = HashMap::new();
        if tenant_ids.is_empty() {
            return Ok(grouped);
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM domain \
                 WHERE tenant_id IN $tenant_ids \
                 ORDER BY created_at ASC, hostname ASC",
            )
            .bind(("tenant_ids", tx::id_strings(tenant_ids)))
            .await?;

        let rows: Vec<DomainRowWithId> = result.take(0)?;
        for row in rows {
            let domain = row.try_into_domain()?;
            grouped.entry(domain.tenant_id).or_default().push(domain);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<TenantRowWithId>) -> Result<Vec<Tenant>, DbError> {
        let ids = rows
            .iter()
            .map(TenantRowWithId::tenant_id)
            .collect::<Result<Vec<_>, _>>()?;
        let mut domains = self.load_domains(&ids).await?;

        rows.into_iter()
            .zip(ids)
            .map(|(row, id)| row.try_into_tenant(domains.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM tenant WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await?;
        let rows: Vec<TenantRowWithId> = result.take(0)?;
        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    async fn find_domain(&self, hostname: &str) -> Result<Option<Domain>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM domain WHERE hostname = $hostname")
            .bind(("hostname", hostname.to_string()))
            .await?;
        let rows: Vec<DomainRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(DomainRowWithId::try_into_domain)
            .transpose()
    }

    async fn hostname_conflict(&self, hostname: &str) -> WardenResult<Option<WardenError>> {
        Ok(self.find_domain(hostname).await?.map(|existing| {
            WardenError::conflict(
                "domain",
                format!(
                    "hostname {hostname} is already registered to tenant {}",
                    existing.tenant_id
                ),
            )
        }))
    }

    async fn get_domain(&self, id: Uuid) -> WardenResult<Domain> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('domain', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<DomainRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("domain", id))?;

        Ok(row.into_domain(id)?)
    }

    async fn schema_name_taken(&self, schema_name: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM tenant WHERE schema_name = $schema_name GROUP ALL")
            .bind(("schema_name", schema_name.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    /// Explain a rejected create by re-reading the unique columns.
    /// `None` means nothing is wrong with the input and the write can be
    /// retried.
    async fn diagnose_create(&self, input: &NewTenant) -> WardenResult<Option<WardenError>> {
        if self.find_by_slug(&input.slug).await?.is_some() {
            return Ok(Some(WardenError::conflict(
                "tenant",
                format!("slug {} is already registered", input.slug),
            )));
        }
        if self.schema_name_taken(&input.schema_name).await? {
            return Ok(Some(WardenError::conflict(
                "tenant",
                format!("schema name {} is already in use", input.schema_name),
            )));
        }
        self.hostname_conflict(&input.primary_hostname).await
    }

    async fn diagnose_add_domain(
        &self,
        tenant_id: Uuid,
        hostname: &str,
    ) -> WardenResult<Option<WardenError>> {
        let tenant = self.get_by_id(tenant_id).await?;
        if tenant.status == TenantStatus::Deleted {
            return Ok(Some(WardenError::InvalidState {
                entity: "tenant".into(),
                action: "add domain to".into(),
                from: tenant.status.to_string(),
            }));
        }
        self.hostname_conflict(hostname).await
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: NewTenant) -> WardenResult<Tenant> {
        let id = Uuid::new_v4();
        let domain_id = Uuid::new_v4();

        let query = tx::transaction([
            "CREATE type::record('tenant', $id) SET \
             name = $name, slug = $slug, \
             schema_name = $schema_name, status = 'active';",
            "CREATE type::record('domain', $domain_id) SET \
             tenant_id = $id, hostname = $hostname, is_primary = true;",
        ]);
        let mut last_error = String::new();

        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }

            let outcome = self
                .db
                .query(query.clone())
                .bind(("id", id.to_string()))
                .bind(("domain_id", domain_id.to_string()))
                .bind(("name", input.name.clone()))
                .bind(("slug", input.slug.clone()))
                .bind(("schema_name", input.schema_name.clone()))
                .bind(("hostname", input.primary_hostname.clone()))
                .await
                .and_then(|response| response.check());

            let Err(e) = outcome else {
                return self.get_by_id(id).await;
            };
            last_error = e.to_string();
            debug!(slug = %input.slug, attempt, error = %last_error, "Tenant create transaction rejected");
            if let Some(err) = self.diagnose_create(&input).await? {
                return Err(err);
            }
        }

        warn!(slug = %input.slug, error = %last_error, "Tenant create gave up after retries");
        Err(DbError::contention("tenant", last_error).into())
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", id_str))?;

        let domains = self.load_domains(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(row.into_tenant(id, domains)?)
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Tenant> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| WardenError::not_found("tenant", format!("slug={slug}")))
    }

    async fn get_by_hostname(&self, hostname: &str) -> WardenResult<Tenant> {
        let domain = self
            .find_domain(hostname)
            .await?
            .ok_or_else(|| WardenError::not_found("domain", hostname))?;
        self.get_by_id(domain.tenant_id).await
    }

    async fn list(
        &self,
        status: Option<TenantStatus>,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<Tenant>> {
        let filter = if status.is_some() {
            "WHERE status = $status"
        } else {
            ""
        };
        let status_str = status.map(|s| s.as_str().to_string());

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM tenant {filter} GROUP ALL"
            ))
            .bind(("status", status_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM tenant {filter} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("status", status_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = self.hydrate(rows).await?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TenantStatus,
        next: TenantStatus,
    ) -> WardenResult<Option<Tenant>> {
        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }

            let outcome = self
                .db
                .query(
                    "UPDATE type::record('tenant', $id) SET \
                     status = $next, revision += 1, updated_at = time::now() \
                     WHERE status = $expected",
                )
                .bind(("id", id.to_string()))
                .bind(("expected", expected.as_str().to_string()))
                .bind(("next", next.as_str().to_string()))
                .await
                .and_then(|response| response.check());

            let mut result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    debug!(tenant_id = %id, attempt, error = %e, "Tenant status update rejected");
                    continue;
                }
            };

            let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
            let Some(row) = rows.into_iter().next() else {
                return Ok(None);
            };
            let domains = self.load_domains(&[id]).await?.remove(&id).unwrap_or_default();
            return Ok(Some(row.into_tenant(id, domains)?));
        }

        // Callers treat a lost race and exhausted contention the same way:
        // re-read and decide again.
        warn!(tenant_id = %id, %expected, %next, "Tenant status update gave up after retries");
        Ok(None)
    }

    async fn add_domain(
        &self,
        tenant_id: Uuid,
        hostname: String,
        is_primary: bool,
    ) -> WardenResult<Domain> {
        let id = Uuid::new_v4();

        let mut statements = vec![TENANT_GUARD];
        if is_primary {
            statements.push(
                "UPDATE domain SET is_primary = false \
                 WHERE tenant_id = $tenant_id AND is_primary = true;",
            );
        }
        statements.push(
            "CREATE type::record('domain', $id) SET \
             tenant_id = $tenant_id, hostname = $hostname, \
             is_primary = $is_primary;",
        );

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
                .bind(("tenant_id", tenant_id.to_string()))
                .bind(("hostname", hostname.clone()))
                .bind(("is_primary", is_primary))
                .await
                .and_then(|response| response.check());

            let Err(e) = outcome else {
                return self.get_domain(id).await;
            };
            last_error = e.to_string();
            debug!(%tenant_id, %hostname, attempt, error = %last_error, "Add-domain transaction rejected");
            if let Some(err) = self.diagnose_add_domain(tenant_id, &hostname).await? {
                return Err(err);
            }
        }

        warn!(%tenant_id, %hostname, error = %last_error, "Add domain gave up after retries");
        Err(DbError::contention("domain", last_error).into())
    }

    async fn list_domains(&self, tenant_id: Uuid) -> WardenResult<Vec<Domain>> {
        Ok(self
            .load_domains(&[tenant_id])
            .await?
            .remove(&tenant_id)
            .unwrap_or_default())
    }
}
