//! # Error Types
//!
//! Domain-specific error types for comptoir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comptoir-core errors (this file)                                      │
//! │  ├── CoreError        - Domain failures (corrupt hierarchy, ...)       │
//! │  └── ValidationError  - Input and invariant violations                 │
//! │                                                                         │
//! │  comptoir-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, transient conflicts         │
//! │                                                                         │
//! │  comptoir-service errors                                               │
//! │  └── ServiceError     - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ServiceError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, ID, field)
//! 3. Validation errors are never retried; they go straight to the caller

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The stored parent chain loops back on itself.
    ///
    /// ## When This Occurs
    /// An ancestor walk visited more nodes than the arena holds. Writes
    /// through the hierarchy manager never produce this; it signals rows
    /// edited behind its back.
    #[error("Category hierarchy is corrupt around {id}: parent chain does not terminate")]
    CorruptHierarchy { id: String },

    /// Category referenced by id is not part of the loaded arena.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation and invariant errors.
///
/// Everything here is a caller mistake: surfaced as-is, never auto-retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid email, invalid country code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate natural key (code, sku, ean, email, ...).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A referenced row does not exist (parent category, owning customer).
    #[error("{entity} referenced by {field} does not exist: {id}")]
    MissingRelation {
        entity: String,
        field: String,
        id: String,
    },

    /// A node was given itself as parent.
    #[error("Category {id} cannot be its own parent")]
    SelfParent { id: String },

    /// The proposed parent is a descendant of the node.
    #[error("Moving category {id} under {parent_id} would create a cycle")]
    CyclicParent { id: String, parent_id: String },

    /// Deletion blocked because other rows still depend on this one.
    #[error("Cannot delete {entity} {id}: {reason}")]
    HasDependents {
        entity: String,
        id: String,
        reason: String,
    },

    /// The row carries the scope's primary/default flag and siblings remain.
    #[error("{entity} {id} is flagged {flag}; assign the flag to another row first")]
    FlagReassignRequired {
        entity: String,
        id: String,
        flag: String,
    },

    /// The row does not belong to the scope the caller named.
    #[error("{entity} {id} does not belong to {scope}")]
    ScopeMismatch {
        entity: String,
        id: String,
        scope: String,
    },

    /// Any other business rule (LEAD needs an email, ...).
    #[error("{0}")]
    BusinessRule(String),
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::Duplicate`].
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::Duplicate {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`ValidationError::MissingRelation`].
    pub fn missing(entity: impl Into<String>, field: impl Into<String>, id: impl Into<String>) -> Self {
        ValidationError::MissingRelation {
            entity: entity.into(),
            field: field.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("name");
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::CyclicParent {
            id: "A".to_string(),
            parent_id: "B".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Moving category A under B would create a cycle"
        );

        let err = ValidationError::duplicate("email", "a@b.fr");
        assert_eq!(err.to_string(), "email 'a@b.fr' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("code").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
