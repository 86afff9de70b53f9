//! # Service Error Type
//!
//! What callers of the domain services see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Comptoir                               │
//! │                                                                         │
//! │  ValidationError (core) ──────────────────────► Validation             │
//! │  CoreError::CorruptHierarchy ─────────────────► Internal               │
//! │  DbError::NotFound ───────────────────────────► NotFound               │
//! │  DbError::UniqueViolation ────────────────────► Validation(Duplicate)  │
//! │  DbError::Busy / Conflict ── retried ── still failing ──► Conflict     │
//! │  anything else ───────────────────────────────► Database               │
//! │                                                                         │
//! │  error.code() → NOT_FOUND | VALIDATION_ERROR | CONFLICT | DATABASE_ERROR│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use comptoir_core::{CoreError, ValidationError};
use comptoir_db::{DbError, Transient};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error category for outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Entity id or code does not exist.
    NotFound,

    /// Bad input or a broken business rule. Never retried.
    ValidationError,

    /// Lock contention outlasted every retry. The caller may try again later.
    Conflict,

    /// Storage failure.
    DatabaseError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Transient failure left after the retry budget was spent.
    #[error("Concurrent update conflict, retries exhausted: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(DbError),

    /// Stored data breaks an invariant the services maintain.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Validation(_) => ErrorCode::ValidationError,
            ServiceError::NotFound { .. } => ErrorCode::NotFound,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::Database(_) | ServiceError::Internal(_) => ErrorCode::DatabaseError,
        }
    }

    /// Turns a transient database error into the final `Conflict` once the
    /// retry loop has given up.
    pub(crate) fn exhausted(self) -> Self {
        match self {
            ServiceError::Database(err) if err.is_transient() => ServiceError::Conflict(err.to_string()),
            other => other,
        }
    }
}

impl Transient for ServiceError {
    fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Database(err) if err.is_transient())
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                // "customers.email" → "email"
                let field = field.rsplit('.').next().unwrap_or(&field).to_string();
                ServiceError::Validation(ValidationError::duplicate(field, value))
            }
            DbError::Validation(err) => ServiceError::Validation(err),
            other => ServiceError::Database(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(err) => ServiceError::Validation(err),
            CoreError::CategoryNotFound(id) => ServiceError::not_found("Category", id),
            CoreError::CorruptHierarchy { .. } => {
                tracing::error!(error = %err, "Stored category hierarchy is corrupt");
                ServiceError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ServiceError::not_found("Customer", "x").code(), ErrorCode::NotFound);
        assert_eq!(
            ServiceError::from(ValidationError::required("name")).code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            ServiceError::from(DbError::Busy("locked".into())).exhausted().code(),
            ErrorCode::Conflict
        );
        assert_eq!(
            ServiceError::from(DbError::QueryFailed("boom".into())).code(),
            ErrorCode::DatabaseError
        );
    }

    #[test]
    fn test_duplicate_strips_table_name() {
        let err = ServiceError::from(DbError::duplicate("customers.email", "a@b.fr"));
        match err {
            ServiceError::Validation(ValidationError::Duplicate { field, value }) => {
                assert_eq!(field, "email");
                assert_eq!(value, "a@b.fr");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_only_database_busy_is_transient() {
        assert!(ServiceError::from(DbError::Busy("x".into())).is_transient());
        assert!(ServiceError::from(DbError::Conflict("x".into())).is_transient());
        assert!(!ServiceError::not_found("Contact", "k").is_transient());
        assert!(!ServiceError::Conflict("x".into()).is_transient());
    }

    #[test]
    fn test_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ValidationError).unwrap();
        assert_eq!(json, "\"VALIDATION_ERROR\"");
        assert_eq!(ErrorCode::DatabaseError.as_str(), "DATABASE_ERROR");
    }
}
