//! SurrealDB implementation of [`UserDirectory`].
//!
//! Authentication lives elsewhere; this table only gives every invited
//! email address a stable user id.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::repository::UserDirectory;

use crate::error::{DbError, parse_uuid};
use crate::repository::tx;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
}

/// SurrealDB implementation of the user directory.
#[derive(Clone)]
pub struct SurrealUserDirectory<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserDirectory<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn lookup(&self, email: &str) -> Result<Option<Uuid>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await?;
        let rows: Vec<UserRow> = result.take(0)?;
        rows.first()
            .map(|row| parse_uuid(&row.record_id, "user"))
            .transpose()
    }
}

impl<C: Connection> UserDirectory for SurrealUserDirectory<C> {
    async fn find_by_email(&self, email: &str) -> WardenResult<Option<Uuid>> {
        Ok(self.lookup(email).await?)
    }

    async fn resolve_or_register(&self, email: &str) -> WardenResult<Uuid> {
        let mut last_error = String::new();

        for attempt in 1..=tx::MAX_TX_ATTEMPTS {
            if attempt > 1 {
                tx::backoff(attempt - 1).await;
            }
            // A rejected registration usually means another caller won
            // the race; their id is authoritative.
            if let Some(id) = self.lookup(email).await? {
                return Ok(id);
            }

            let id = Uuid::new_v4();
            let outcome = self
                .db
                .query("CREATE type::record('user', $id) SET email = $email")
                .bind(("id", id.to_string()))
                .bind(("email", email.to_string()))
                .await
                .and_then(|response| response.check());

            match outcome {
                Ok(_) => {
                    info!(user_id = %id, "Registered directory user");
                    return Ok(id);
                }
                Err(e) => {
                    last_error = e.to_string();
                    debug!(attempt, error = %last_error, "Directory registration rejected");
                }
            }
        }

        warn!(error = %last_error, "Directory registration gave up after retries");
        Err(DbError::contention("user", last_error).into())
    }
}
