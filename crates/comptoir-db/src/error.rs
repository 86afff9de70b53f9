//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── is_transient() ──► retried by retry::retry_transient          │
//! │       ▼                                                                 │
//! │  ServiceError (comptoir-service) ← Carries a machine-readable code     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use comptoir_core::ValidationError;
use thiserror::Error;

use crate::retry::Transient;

/// Columns guarded by a partial unique index on a primary/default flag.
///
/// A violation there means a concurrent writer flagged another row of the
/// same scope between our clear and our set: the unit is safe to replay.
const FLAG_INDEX_COLUMNS: &[&str] = &["contacts.customer_id", "addresses.customer_id"];

/// SQLite primary and extended result codes for lock contention.
///
/// 5 BUSY, 6 LOCKED, 261 BUSY_RECOVERY, 262 LOCKED_SHAREDCACHE,
/// 517 BUSY_SNAPSHOT, 773 BUSY_TIMEOUT.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate code, sku, ean, email, siret
    /// - Duplicate username or role name
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a category that still has children or products
    /// - Referencing a customer that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Another connection holds the write lock (SQLITE_BUSY family).
    #[error("Database busy: {0}")]
    Busy(String),

    /// A concurrent writer raced us on a singleton flag.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// Invariant or input rule checked inside a unit of work.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for lock contention and flag races: replaying the whole unit
    /// of work may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::Conflict(_) | DbError::PoolExhausted)
    }

    /// Fills in the offending value of a UniqueViolation, which SQLite
    /// does not report.
    pub fn with_value(self, value: impl Into<String>) -> Self {
        match self {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: value.into(),
            },
            other => other,
        }
    }
}

impl Transient for DbError {
    fn is_transient(&self) -> bool {
        DbError::is_transient(self)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy code?        → DbError::Busy
///                               flag index?       → DbError::Conflict
///                               other constraint  → Unique / ForeignKey
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if code.as_deref().is_some_and(|c| BUSY_CODES.contains(&c))
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    if FLAG_INDEX_COLUMNS.contains(&field.as_str()) {
                        DbError::Conflict(field)
                    } else {
                        DbError::UniqueViolation {
                            field,
                            value: "unknown".to_string(),
                        }
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::Busy("locked".into()).is_transient());
        assert!(DbError::Conflict("contacts.customer_id".into()).is_transient());
        assert!(!DbError::not_found("Contact", "x").is_transient());
        assert!(!DbError::Validation(ValidationError::required("name")).is_transient());
        assert!(!DbError::duplicate("customers.code", "CLI-2025-0001").is_transient());
    }

    #[test]
    fn test_with_value() {
        let err = DbError::duplicate("products.sku", "unknown").with_value("SKU-1");
        assert_eq!(err.to_string(), "Duplicate products.sku: 'SKU-1' already exists");
        assert!(matches!(DbError::PoolExhausted.with_value("x"), DbError::PoolExhausted));
    }
}
