//! # Business Code Sequences
//!
//! Pure half of the sequence generator: counter rows, well-known sequence
//! types and the code format. The atomic increment lives in comptoir-db.
//!
//! ## Code Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │     CLI  -  2025  -  0007                                               │
//! │     ───     ────     ────                                               │
//! │   prefix    year     current_value zero-padded to padding_length       │
//! │                                                                         │
//! │   One counter per (sequence_type, year). A new year starts at 0001.    │
//! │   Values wider than the padding print in full: CLI-2025-12345          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Padding used when a counter is created without an explicit width.
pub const DEFAULT_PADDING: u32 = 4;

/// Widest padding accepted for a counter.
pub const MAX_PADDING: u32 = 12;

// =============================================================================
// Sequence Type
// =============================================================================

/// Sequences used by the domain services.
///
/// The generator itself accepts any `(type, prefix)` pair; these are the
/// ones the catalog and CRM issue codes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceType {
    Customer,
    Category,
    Product,
    Contact,
}

impl SequenceType {
    /// Value stored in `sequences.sequence_type`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SequenceType::Customer => "CUSTOMER",
            SequenceType::Category => "CATEGORY",
            SequenceType::Product => "PRODUCT",
            SequenceType::Contact => "CONTACT",
        }
    }

    /// Code prefix, e.g. `CLI` in `CLI-2025-0001`.
    pub const fn prefix(&self) -> &'static str {
        match self {
            SequenceType::Customer => "CLI",
            SequenceType::Category => "CAT",
            SequenceType::Product => "PRD",
            SequenceType::Contact => "CNT",
        }
    }
}

// =============================================================================
// Counter
// =============================================================================

/// Durable per-(type, year) counter.
///
/// `current_value` never decreases; rows are never deleted, so codes are
/// never reissued even after the owning entity is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Counter {
    pub sequence_type: String,
    pub year: i32,
    pub prefix: String,
    pub current_value: i64,
    pub padding_length: i32,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Counter {
    /// Code for the counter's current value.
    pub fn current_code(&self) -> String {
        format_code(
            &self.prefix,
            self.year,
            self.current_value,
            self.padding_length.max(0) as usize,
        )
    }
}

// =============================================================================
// Formatting & Validation
// =============================================================================

/// Formats `prefix-year-zeropad(value)`.
///
/// ## Example
/// ```rust
/// use comptoir_core::sequence::format_code;
///
/// assert_eq!(format_code("CLI", 2025, 1, 4), "CLI-2025-0001");
/// assert_eq!(format_code("CLI", 2025, 123456, 4), "CLI-2025-123456");
/// ```
pub fn format_code(prefix: &str, year: i32, value: i64, padding: usize) -> String {
    format!("{prefix}-{year}-{value:0padding$}")
}

/// Validates a sequence type name (`CUSTOMER`, `supplier-invoice`, ...).
///
/// Any non-blank name is accepted; surrounding whitespace is not part of it.
pub fn validate_sequence_type(sequence_type: &str) -> ValidationResult<()> {
    let sequence_type = sequence_type.trim();
    if sequence_type.is_empty() {
        return Err(ValidationError::required("sequence_type"));
    }
    if sequence_type.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "sequence_type".to_string(),
            max: 50,
        });
    }
    Ok(())
}

/// Validates a code prefix (`CLI`, `PRD`, ...).
pub fn validate_prefix(prefix: &str) -> ValidationResult<()> {
    if prefix.trim().is_empty() {
        return Err(ValidationError::required("prefix"));
    }
    if prefix.len() > 10 {
        return Err(ValidationError::TooLong {
            field: "prefix".to_string(),
            max: 10,
        });
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "prefix".to_string(),
            reason: "must be alphanumeric".to_string(),
        });
    }
    Ok(())
}

/// Validates a padding width.
pub fn validate_padding(padding: u32) -> ValidationResult<()> {
    if padding == 0 || padding > MAX_PADDING {
        return Err(ValidationError::OutOfRange {
            field: "padding_length".to_string(),
            min: 1,
            max: MAX_PADDING as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_code_pads() {
        assert_eq!(format_code("CLI", 2025, 1, 4), "CLI-2025-0001");
        assert_eq!(format_code("CLI", 2025, 5, 4), "CLI-2025-0005");
        assert_eq!(format_code("PRD", 2026, 42, 6), "PRD-2026-000042");
    }

    #[test]
    fn test_format_code_wider_than_padding() {
        assert_eq!(format_code("CAT", 2025, 10000, 4), "CAT-2025-10000");
    }

    #[test]
    fn test_well_known_prefixes() {
        assert_eq!(SequenceType::Customer.prefix(), "CLI");
        assert_eq!(SequenceType::Category.prefix(), "CAT");
        assert_eq!(SequenceType::Product.prefix(), "PRD");
        assert_eq!(SequenceType::Contact.prefix(), "CNT");
        assert_eq!(SequenceType::Contact.as_str(), "CONTACT");
    }

    #[test]
    fn test_validate_inputs() {
        assert!(validate_sequence_type("CUSTOMER").is_ok());
        assert!(validate_sequence_type("").is_err());
        assert!(validate_sequence_type("   ").is_err());
        assert!(validate_sequence_type("supplier invoice").is_ok());
        assert!(validate_sequence_type(&"X".repeat(50)).is_ok());
        assert!(validate_sequence_type(&"X".repeat(51)).is_err());

        assert!(validate_prefix("CLI").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("C-I").is_err());

        assert!(validate_padding(4).is_ok());
        assert!(validate_padding(0).is_err());
        assert!(validate_padding(13).is_err());
    }
}
