//! Customers and their postal addresses.
//!
//! ## Ownership
//! ```text
//! Customer (scope)
//!   ├── Address  (is_default: at most one per customer)
//!   └── Contact  (is_primary: at most one per customer)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Archived,
}

impl CustomerStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "Actif",
            CustomerStatus::Inactive => "Inactif",
            CustomerStatus::Suspended => "Suspendu",
            CustomerStatus::Archived => "Archivé",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    #[default]
    Company,
    Individual,
    Administration,
}

impl CustomerType {
    pub const fn label(&self) -> &'static str {
        match self {
            CustomerType::Company => "Entreprise",
            CustomerType::Individual => "Particulier",
            CustomerType::Administration => "Administration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    Billing,
    Shipping,
    #[default]
    Both,
    Other,
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    /// Business code (`CLI-2025-0001`).
    pub code: String,
    pub company_name: String,
    pub contact_first_name: Option<String>,
    pub contact_last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    /// French company identifier (14 digits).
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub payment_term_days: i32,
    pub status: CustomerStatus,
    pub customer_type: CustomerType,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn credit_limit(&self) -> Option<Money> {
        self.credit_limit_cents.map(Money::from_cents)
    }

    /// "First Last" of the main contact person, when known.
    pub fn contact_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.contact_first_name, &self.contact_last_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Caller-supplied customer fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    /// `None` generates a `CLI-` code on create, keeps the current one on update.
    pub code: Option<String>,
    pub company_name: String,
    pub contact_first_name: Option<String>,
    pub contact_last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub payment_term_days: i32,
    pub status: CustomerStatus,
    pub customer_type: CustomerType,
    pub notes: Option<String>,
    /// Addresses created with the customer (create only).
    #[serde(default)]
    pub addresses: Vec<AddressInput>,
}

impl CustomerInput {
    pub fn new(company_name: impl Into<String>) -> Self {
        CustomerInput {
            code: None,
            company_name: company_name.into(),
            contact_first_name: None,
            contact_last_name: None,
            email: None,
            phone: None,
            mobile: None,
            siret: None,
            vat_number: None,
            credit_limit_cents: None,
            payment_term_days: 30,
            status: CustomerStatus::Active,
            customer_type: CustomerType::Company,
            notes: None,
            addresses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    pub customer_type: Option<CustomerType>,
    /// Case-insensitive match on code, company name, email or contact name.
    pub search: Option<String>,
}

// =============================================================================
// Address
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Address {
    pub id: String,
    pub customer_id: String,
    pub address_type: AddressType,
    pub label: Option<String>,
    pub street1: String,
    pub street2: Option<String>,
    pub zip_code: String,
    pub city: String,
    pub state: Option<String>,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
    pub is_default: bool,
    pub active: bool,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub delivery_instructions: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Single-line postal rendering: `12 rue X, Bât B, 75001 Paris, FR`.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street1.clone()];
        if let Some(street2) = self.street2.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(street2.to_string());
        }
        parts.push(format!("{} {}", self.zip_code, self.city));
        parts.push(self.country_code.clone());
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddressInput {
    pub address_type: AddressType,
    pub label: Option<String>,
    pub street1: String,
    pub street2: Option<String>,
    pub zip_code: String,
    pub city: String,
    pub state: Option<String>,
    pub country_code: String,
    pub is_default: bool,
    pub active: bool,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub delivery_instructions: Option<String>,
}

impl AddressInput {
    pub fn new(street1: impl Into<String>, zip_code: impl Into<String>, city: impl Into<String>) -> Self {
        AddressInput {
            address_type: AddressType::Both,
            label: None,
            street1: street1.into(),
            street2: None,
            zip_code: zip_code.into(),
            city: city.into(),
            state: None,
            country_code: "FR".to_string(),
            is_default: false,
            active: true,
            contact_name: None,
            contact_phone: None,
            contact_email: None,
            delivery_instructions: None,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}
