//! SurrealDB implementation of [`MembershipRepository`].
//!
//! Pair uniqueness is enforced by a unique index on `pair_key`
//! (`<tenant_id>:<user_id>`). Superseding a revoked membership rewrites
//! its key so the pair can be invited again while the old record stays
//! for audit.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::membership::{Membership, MembershipStatus, NewMembership};
use warden_core::models::tenant::TenantStatus;
use warden_core::repository::{MembershipRepository, PaginatedResult, Pagination};

use crate::error::{DbError, parse_uuid};
use crate::repository::role::membership_roles;
use crate::repository::tx::{self, MEMBERSHIP_GUARD, TENANT_GUARD};

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    tenant_id: String,
    user_id: String,
    email: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct MembershipRowWithId {
    record_id: String,
    tenant_id: String,
    user_id: String,
    email: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct StatusRow {
    status: String,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn pair_key(tenant_id: Uuid, user_id: Uuid) -> String {
    format!("{tenant_id}:{user_id}")
}

fn retired_pair_key(tenant_id: Uuid, user_id: Uuid, membership_id: Uuid) -> String {
    format!("{}:superseded:{membership_id}", pair_key(tenant_id, user_id))
}

fn parse_status(raw: &str) -> Result<MembershipStatus, DbError> {
    raw.parse()
        .map_err(|_| DbError::Corrupt(format!("unknown membership status: {raw}")))
}

impl MembershipRow {
    fn into_membership(self, id: Uuid) -> Result<Membership, DbError> {
        Ok(Membership {
            id,
            user_id: parse_uuid(&self.user_id, "user")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            email: self.email,
            status: parse_status(&self.status)?,
            roles: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl MembershipRowWithId {
    fn try_into_membership(self) -> Result<Membership, DbError> {
        let id = parse_uuid(&self.record_id, "membership")?;
        MembershipRow {
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            email: self.email,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_membership(id)
    }
}

/// SurrealDB implementation of the Membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn with_roles(&self, mut membership: Membership) -> Result<Membership, DbError> {
        membership.roles = membership_roles(&self.db, membership.id).await?;
        Ok(membership)
    }

    async fn tenant_status(&self, tenant_id: Uuid) -> Result<Option<TenantStatus>, DbError> {
        let mut result = self
            .db
            .query("SELECT status FROM type::record('tenant', $id)")
            .bind(("id", tenant_id.to_string()))
            .await?;
        let rows: Vec<StatusRow> = result.take(0)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.status.parse().map_err(|_| {
                DbError::Corrupt(format!("unknown tenant status: {}", row.status))
            })?)),
            None => Ok(None),
        }
    }

    /// Explain a rejected invite by re-reading the tenant and the pair.
    /// `None` means the write lost a race and can be retried.
    async fn diagnose_create(&self, input: &NewMembership) -> WardenResult<Option<WardenError>> {
        match self.tenant_status(input.tenant_id).await? {
            None | Some(TenantStatus::Deleted) => {
                return Ok(Some(WardenError::not_found("tenant", input.tenant_id)));
            }
            Some(_) => {}
        }
        if let Some(existing) = self.find_for_user(input.tenant_id, input.user_id).await? {
            let superseded = input.supersedes == Some(existing.id)
                && existing.status == MembershipStatus::Revoked;
            if !superseded {
                return Ok(Some(WardenError::conflict(
                    "membership",
                    format!(
                        "{} already has a {} membership in tenant {}",
                        input.email, existing.status, input.tenant_id
                    ),
                )));
            }
        }
        Ok(None)
    }

    async fn diagnose_replace_roles(&self, id: Uuid) -> WardenResult<Option<WardenError>> {
        let current = self.get_by_id(id).await?;
        if current.status == MembershipStatus::Revoked {
            return Ok(Some(WardenError::InvalidState {
                entity: "membership".into(),
                action: "assign roles to".into(),
                from: current.status.to_string(),
            }));
        }
        Ok(None)
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create(&self, input: NewMembership) -> WardenResult<Membership> {
        let id = Uuid::new_v4();

        let mut statements = vec![TENANT_GUARD.to_string()];
        if input.supersedes.is_some() {
            statements.push(
                "UPDATE type::record('membership', $supersedes) SET \
                 superseded = true, pair_key = $retired_key, \
                 updated_at = time::now() \
                 WHERE status = 'revoked' AND pair_key = $pair_key;"
                    .to_string(),
            );
        }
        statements.push(
            "CREATE type::record('membership', $id) SET \
             tenant_id = $tenant_id, user_id = $user_id, email = $email, \
             status = 'pending', pair_key = $pair_key;"
                .to_string(),
        );
        statements.extend(tx::relate_all(
            "membership",
            id,
            "has_role",
            "role",
            &input.role_ids,
        ));

        let retired_key = input
            .supersedes
            .map(|old| retired_pair_key(input.tenant_id, input.user_id, old));

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
                .bind(("tenant_id", input.tenant_id.to_string()))
                .bind(("user_id", input.user_id.to_string()))
                .bind(("email", input.email.clone()))
                .bind(("pair_key", pair_key(input.tenant_id, input.user_id)))
                .bind(("supersedes", input.supersedes.map(|s| s.to_string())))
                .bind(("retired_key", retired_key.clone()))
                .await
                .and_then(|response| response.check());

            let Err(e) = outcome else {
                return self.get_by_id(id).await;
            };
            last_error = e.to_string();
            debug!(
                tenant_id = %input.tenant_id,
                user_id = %input.user_id,
                attempt,
                error = %last_error,
                "Membership create transaction rejected"
            );
            if let Some(err) = self.diagnose_create(&input).await? {
                return Err(err);
            }
        }

        warn!(
            tenant_id = %input.tenant_id,
            user_id = %input.user_id,
            error = %last_error,
            "Membership create gave up after retries"
        );
        Err(DbError::contention("membership", last_error).into())
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Membership> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('membership', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("membership", id_str))?;

        Ok(self.with_roles(row.into_membership(id)?).await?)
    }

    async fn find_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> WardenResult<Option<Membership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM membership \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND superseded = false",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(self.with_roles(row.try_into_membership()?).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<Membership>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM membership \
                 WHERE tenant_id = $tenant_id AND superseded = false GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM membership \
                 WHERE tenant_id = $tenant_id AND superseded = false \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRowWithId> = result.take(0).map_err(DbError::from)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.with_roles(row.try_into_membership()?).await?);
        }

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
        expected: MembershipStatus,
        next: MembershipStatus,
    ) -> WardenResult<Option<Membership>> {
        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }

            let outcome = self
                .db
                .query(
                    "UPDATE type::record('membership', $id) SET \
                     status = $next, updated_at = time::now() \
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
                    debug!(membership_id = %id, attempt, error = %e, "Membership status update rejected");
                    continue;
                }
            };

            let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
            return match rows.into_iter().next() {
                Some(row) => Ok(Some(self.with_roles(row.into_membership(id)?).await?)),
                None => Ok(None),
            };
        }

        warn!(membership_id = %id, %expected, %next, "Membership status update gave up after retries");
        Ok(None)
    }

    async fn replace_roles(&self, id: Uuid, role_ids: Vec<Uuid>) -> WardenResult<Membership> {
        let mut statements = vec![
            MEMBERSHIP_GUARD.to_string(),
            "DELETE has_role WHERE in = type::record('membership', $id);".to_string(),
        ];
        statements.extend(tx::relate_all("membership", id, "has_role", "role", &role_ids));

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
                .await
                .and_then(|response| response.check());

            let Err(e) = outcome else {
                return self.get_by_id(id).await;
            };
            last_error = e.to_string();
            debug!(membership_id = %id, attempt, error = %last_error, "Role replacement rejected");
            if let Some(err) = self.diagnose_replace_roles(id).await? {
                return Err(err);
            }
        }

        warn!(membership_id = %id, error = %last_error, "Role replacement gave up after retries");
        Err(DbError::contention("membership", last_error).into())
    }
}
