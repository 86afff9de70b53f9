//! # Validation Module
//!
//! Field and business-rule validation for Comptoir inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                           │
//! │  ├── Field format and length                                           │
//! │  └── Per-entity business rules (LEAD needs email, ...)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Domain services (inside the write transaction)               │
//! │  ├── Natural-key uniqueness (global or excluding self)                 │
//! │  ├── Relation existence (parent category, owning customer)             │
//! │  └── Structural invariants (acyclic tree, single primary flag)         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── UNIQUE / partial UNIQUE indexes                                   │
//! │  └── Foreign keys with ON DELETE RESTRICT                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{
    AddressInput, CategoryInput, ContactInput, ContactPriority, ContactType, CustomerInput,
    NewUser, PermissionInput, ProductInput,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text search accepted by listings.
pub const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required, length-bounded text field.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    validate_max_len(field, value, max)
}

/// Validates an optional, length-bounded text field.
pub fn validate_optional(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) => validate_max_len(field, v.trim(), max),
        None => Ok(()),
    }
}

fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a business code (`CLI-2025-0001`, `BOISSONS`, ...).
///
/// ## Rules
/// - Must not be empty
/// - At most `max` characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use comptoir_core::validation::validate_code;
///
/// assert!(validate_code("CAT-2025-0001", 20).is_ok());
/// assert!(validate_code("has space", 20).is_err());
/// ```
pub fn validate_code(code: &str, max: usize) -> ValidationResult<()> {
    validate_required("code", code, max)?;
    if !code
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

/// Validates an optional email address.
///
/// Deliberately loose: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(field: &str, email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = non_blank(email) else {
        return Ok(());
    };
    validate_max_len(field, email, 150)?;

    let invalid = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid email address".to_string(),
    };
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

/// Validates an optional SIRET (14 digits, spaces ignored).
pub fn validate_siret(siret: Option<&str>) -> ValidationResult<()> {
    let Some(siret) = non_blank(siret) else {
        return Ok(());
    };
    let digits: String = siret.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "siret".to_string(),
            reason: "must be 14 digits".to_string(),
        });
    }
    Ok(())
}

/// Validates an optional EAN-8 / EAN-13 barcode.
pub fn validate_ean(ean: Option<&str>) -> ValidationResult<()> {
    let Some(ean) = non_blank(ean) else {
        return Ok(());
    };
    if !(ean.len() == 8 || ean.len() == 13) || !ean.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "ean".to_string(),
            reason: "must be 8 or 13 digits".to_string(),
        });
    }
    Ok(())
}

/// Validates an ISO 3166-1 alpha-2 country code.
pub fn validate_country_code(code: &str) -> ValidationResult<()> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "country_code".to_string(),
            reason: "must be two upper-case letters (ISO 3166-1)".to_string(),
        });
    }
    Ok(())
}

/// Normalises a search query.
///
/// ## Returns
/// `None` when blank (no filtering), the trimmed text otherwise.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = non_blank(query) else {
        return Ok(None);
    };
    validate_max_len("search", query, MAX_SEARCH_LEN)?;
    Ok(Some(query.to_string()))
}

/// Returns the trimmed value when it carries text.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents (zero allowed).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a VAT rate in basis points (0 % to 100 %).
pub fn validate_vat_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "vat_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

fn validate_range(field: &str, value: i64, min: i64, max: i64) -> ValidationResult<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

pub fn validate_category_input(input: &CategoryInput) -> ValidationResult<()> {
    if let Some(code) = non_blank(input.code.as_deref()) {
        validate_code(code, 20)?;
    }
    validate_required("name", &input.name, 100)?;
    validate_optional("description", input.description.as_deref(), 500)?;
    validate_optional("image_url", input.image_url.as_deref(), 500)?;
    validate_optional("icon_class", input.icon_class.as_deref(), 50)?;
    if let Some(order) = input.sort_order {
        validate_range("sort_order", order as i64, 0, i32::MAX as i64)?;
    }
    Ok(())
}

pub fn validate_product_input(input: &ProductInput) -> ValidationResult<()> {
    if let Some(code) = non_blank(input.code.as_deref()) {
        validate_code(code, 30)?;
    }
    validate_required("name", &input.name, 150)?;
    validate_optional("description", input.description.as_deref(), 1000)?;
    validate_optional("reference", input.reference.as_deref(), 50)?;
    validate_optional("sku", input.sku.as_deref(), 50)?;
    validate_ean(input.ean.as_deref())?;
    validate_price_cents("unit_price", input.unit_price_cents)?;
    if let Some(cost) = input.cost_price_cents {
        validate_price_cents("cost_price", cost)?;
    }
    validate_vat_rate_bps(input.vat_rate_bps)?;
    validate_range("min_stock_level", input.min_stock_level as i64, 0, i32::MAX as i64)?;
    validate_range("max_stock_level", input.max_stock_level as i64, 0, i32::MAX as i64)?;
    if input.max_stock_level > 0 && input.max_stock_level < input.min_stock_level {
        return Err(ValidationError::BusinessRule(
            "max_stock_level cannot be lower than min_stock_level".to_string(),
        ));
    }
    validate_required("unit", &input.unit, 10)?;
    validate_required("category_id", &input.category_id, 36)?;
    Ok(())
}

pub fn validate_customer_input(input: &CustomerInput) -> ValidationResult<()> {
    if let Some(code) = non_blank(input.code.as_deref()) {
        validate_code(code, 20)?;
    }
    validate_required("company_name", &input.company_name, 150)?;
    validate_optional("contact_first_name", input.contact_first_name.as_deref(), 50)?;
    validate_optional("contact_last_name", input.contact_last_name.as_deref(), 50)?;
    validate_email("email", input.email.as_deref())?;
    validate_optional("phone", input.phone.as_deref(), 20)?;
    validate_optional("mobile", input.mobile.as_deref(), 20)?;
    validate_siret(input.siret.as_deref())?;
    validate_optional("vat_number", input.vat_number.as_deref(), 20)?;
    if let Some(limit) = input.credit_limit_cents {
        validate_price_cents("credit_limit", limit)?;
    }
    validate_range("payment_term_days", input.payment_term_days as i64, 0, 365)?;
    validate_optional("notes", input.notes.as_deref(), 2000)?;

    if input.addresses.iter().filter(|a| a.is_default).count() > 1 {
        return Err(ValidationError::BusinessRule(
            "only one address can be flagged as default".to_string(),
        ));
    }
    for address in &input.addresses {
        validate_address_input(address)?;
    }
    Ok(())
}

pub fn validate_address_input(input: &AddressInput) -> ValidationResult<()> {
    validate_optional("label", input.label.as_deref(), 100)?;
    validate_required("street1", &input.street1, 200)?;
    validate_optional("street2", input.street2.as_deref(), 200)?;
    validate_required("zip_code", &input.zip_code, 10)?;
    validate_required("city", &input.city, 100)?;
    validate_optional("state", input.state.as_deref(), 100)?;
    validate_country_code(&input.country_code)?;
    validate_optional("contact_name", input.contact_name.as_deref(), 100)?;
    validate_optional("contact_phone", input.contact_phone.as_deref(), 20)?;
    validate_email("contact_email", input.contact_email.as_deref())?;
    validate_optional(
        "delivery_instructions",
        input.delivery_instructions.as_deref(),
        500,
    )?;
    Ok(())
}

/// Field checks plus the CRM business rules.
///
/// ## Rules
/// - A `LEAD` must carry an email address
/// - A `CRITICAL` contact must be reachable by phone or mobile
/// - The next follow-up cannot precede the last interaction
pub fn validate_contact_input(input: &ContactInput) -> ValidationResult<()> {
    if let Some(code) = non_blank(input.code.as_deref()) {
        validate_code(code, 20)?;
    }
    validate_required("first_name", &input.first_name, 50)?;
    validate_optional("last_name", input.last_name.as_deref(), 50)?;
    validate_optional("job_title", input.job_title.as_deref(), 100)?;
    validate_optional("department", input.department.as_deref(), 100)?;
    validate_email("email", input.email.as_deref())?;
    validate_optional("phone", input.phone.as_deref(), 20)?;
    validate_optional("mobile", input.mobile.as_deref(), 20)?;
    validate_optional("address_line1", input.address_line1.as_deref(), 200)?;
    validate_optional("address_line2", input.address_line2.as_deref(), 200)?;
    validate_optional("postal_code", input.postal_code.as_deref(), 10)?;
    validate_optional("city", input.city.as_deref(), 100)?;
    validate_optional("country", input.country.as_deref(), 100)?;
    validate_optional("notes", input.notes.as_deref(), 2000)?;
    validate_required("customer_id", &input.customer_id, 36)?;

    if input.contact_type == ContactType::Lead && non_blank(input.email.as_deref()).is_none() {
        return Err(ValidationError::BusinessRule(
            "email is required for LEAD contacts".to_string(),
        ));
    }

    if input.priority == ContactPriority::Critical
        && non_blank(input.phone.as_deref()).is_none()
        && non_blank(input.mobile.as_deref()).is_none()
    {
        return Err(ValidationError::BusinessRule(
            "a phone or mobile number is required for CRITICAL contacts".to_string(),
        ));
    }

    if let (Some(next), Some(last)) = (input.next_contact_at, input.last_contact_at) {
        if next < last {
            return Err(ValidationError::BusinessRule(
                "next contact date cannot be before the last contact date".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn validate_new_user(input: &NewUser) -> ValidationResult<()> {
    validate_required("username", &input.username, 50)?;
    if !input
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }
    validate_required("email", &input.email, 150)?;
    validate_email("email", Some(&input.email))?;
    validate_password(&input.password)?;
    validate_optional("first_name", input.first_name.as_deref(), 50)?;
    validate_optional("last_name", input.last_name.as_deref(), 50)?;
    Ok(())
}

/// Passwords need at least 8 characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < 8 {
        return Err(ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: "must be at least 8 characters".to_string(),
        });
    }
    validate_max_len("password", password, 128)
}

/// Role names are upper-case identifiers (`ADMIN`, `SALES_MANAGER`).
pub fn validate_role_name(name: &str) -> ValidationResult<()> {
    validate_required("name", name, 50)?;
    if !name.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must contain only A-Z and underscores".to_string(),
        });
    }
    Ok(())
}

pub fn validate_permission_input(input: &PermissionInput) -> ValidationResult<()> {
    validate_role_name(&input.name)?;
    validate_required("module", &input.module, 50)?;
    validate_required("action", &input.action, 50)?;
    validate_optional("resource", input.resource.as_deref(), 100)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_validate_code() {
        assert!(validate_code("CLI-2025-0001", 20).is_ok());
        assert!(validate_code("BOISSONS_FRAICHES", 20).is_ok());
        assert!(validate_code("", 20).is_err());
        assert!(validate_code("has space", 20).is_err());
        assert!(validate_code(&"A".repeat(21), 20).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", None).is_ok());
        assert!(validate_email("email", Some("  ")).is_ok());
        assert!(validate_email("email", Some("jean.dupont@acme.fr")).is_ok());
        assert!(validate_email("email", Some("jean.dupont")).is_err());
        assert!(validate_email("email", Some("@acme.fr")).is_err());
        assert!(validate_email("email", Some("a@b@c.fr")).is_err());
        assert!(validate_email("email", Some("a@acme")).is_err());
    }

    #[test]
    fn test_validate_identifiers() {
        assert!(validate_siret(Some("732 829 320 00074")).is_ok());
        assert!(validate_siret(Some("1234")).is_err());
        assert!(validate_ean(Some("3017620422003")).is_ok());
        assert!(validate_ean(Some("12345678")).is_ok());
        assert!(validate_ean(Some("301762042200X")).is_err());
        assert!(validate_country_code("FR").is_ok());
        assert!(validate_country_code("fr").is_err());
        assert!(validate_country_code("FRA").is_err());
    }

    #[test]
    fn test_search_query_normalised() {
        assert_eq!(validate_search_query(None).unwrap(), None);
        assert_eq!(validate_search_query(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_search_query(Some(" acme ")).unwrap(),
            Some("acme".to_string())
        );
        assert!(validate_search_query(Some(&"x".repeat(101))).is_err());
    }

    #[test]
    fn test_lead_requires_email() {
        let mut input = ContactInput::new("c1", "Jeanne");
        input.contact_type = ContactType::Lead;
        assert!(matches!(
            validate_contact_input(&input),
            Err(ValidationError::BusinessRule(_))
        ));
        input.email = Some("jeanne@acme.fr".to_string());
        assert!(validate_contact_input(&input).is_ok());
    }

    #[test]
    fn test_critical_requires_phone() {
        let mut input = ContactInput::new("c1", "Paul");
        input.priority = ContactPriority::Critical;
        assert!(validate_contact_input(&input).is_err());
        input.mobile = Some("0601020304".to_string());
        assert!(validate_contact_input(&input).is_ok());
    }

    #[test]
    fn test_next_contact_not_before_last() {
        let now = Utc::now();
        let mut input = ContactInput::new("c1", "Paul");
        input.last_contact_at = Some(now);
        input.next_contact_at = Some(now - Duration::days(1));
        assert!(validate_contact_input(&input).is_err());
        input.next_contact_at = Some(now + Duration::days(7));
        assert!(validate_contact_input(&input).is_ok());
    }

    #[test]
    fn test_customer_single_default_address() {
        let mut input = CustomerInput::new("Acme");
        input.addresses = vec![
            AddressInput::new("1 rue A", "75001", "Paris").as_default(),
            AddressInput::new("2 rue B", "69001", "Lyon").as_default(),
        ];
        assert!(validate_customer_input(&input).is_err());
        input.addresses[1].is_default = false;
        assert!(validate_customer_input(&input).is_ok());
    }

    #[test]
    fn test_customer_payment_terms() {
        let mut input = CustomerInput::new("Acme");
        input.payment_term_days = 400;
        assert!(validate_customer_input(&input).is_err());
    }

    #[test]
    fn test_product_input() {
        let mut input = ProductInput::new("Câble HDMI", "cat", 1299);
        assert!(validate_product_input(&input).is_ok());
        input.unit_price_cents = -1;
        assert!(validate_product_input(&input).is_err());
        input.unit_price_cents = 1299;
        input.min_stock_level = 10;
        input.max_stock_level = 5;
        assert!(validate_product_input(&input).is_err());
    }

    #[test]
    fn test_user_inputs() {
        let user = NewUser {
            username: "j.dupont".to_string(),
            email: "j.dupont@acme.fr".to_string(),
            password: "correct horse".to_string(),
            first_name: None,
            last_name: None,
        };
        assert!(validate_new_user(&user).is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_role_name("SALES_MANAGER").is_ok());
        assert!(validate_role_name("sales").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
