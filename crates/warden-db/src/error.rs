//! Database-specific error types and conversions.

use warden_core::error::WardenError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Invalid database configuration: {0}")]
    Config(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Write to {entity} kept conflicting with concurrent writes: {last}")]
    Contention { entity: String, last: String },

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl DbError {
    /// A write that was still rejected after every retry.
    pub(crate) fn contention(entity: &str, last: impl ToString) -> Self {
        DbError::Contention {
            entity: entity.into(),
            last: last.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::Contention { entity, .. } => WardenError::Conflict {
                entity,
                detail: "kept conflicting with concurrent writes; retry later".into(),
            },
            other => WardenError::Database(other.to_string()),
        }
    }
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {what} UUID: {e}")))
}

#[cfg(test)]
mod tests {
    use warden_core::error::ErrorKind;

    use super::*;

    #[test]
    fn contention_surfaces_as_conflict() {
        let err: WardenError = DbError::contention("membership", "write conflict").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("membership"));
    }

    #[test]
    fn not_found_keeps_entity_and_id() {
        let err: WardenError = DbError::not_found("tenant", "abc").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn corrupt_rows_are_internal() {
        let err: WardenError = DbError::Corrupt("bad status".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
