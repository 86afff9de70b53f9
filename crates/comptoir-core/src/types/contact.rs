//! CRM contacts attached to customers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactType {
    #[default]
    Contact,
    Lead,
    Prospect,
    Partner,
    Supplier,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactStatus {
    #[default]
    Active,
    Inactive,
    Blocked,
    Archived,
    /// Email address rejected by the mail server.
    Bounced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Civility {
    Mr,
    Mrs,
    Ms,
    Dr,
    Prof,
}

impl Civility {
    /// French abbreviation used in salutations.
    pub const fn abbreviation(&self) -> &'static str {
        match self {
            Civility::Mr => "M.",
            Civility::Mrs => "Mme",
            Civility::Ms => "Mlle",
            Civility::Dr => "Dr",
            Civility::Prof => "Pr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreferredContact {
    #[default]
    Email,
    Phone,
    Mobile,
    Sms,
    Mail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreferredLanguage {
    #[default]
    French,
    English,
    Spanish,
    German,
    Italian,
}

// =============================================================================
// Contact
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Contact {
    pub id: String,
    /// Business code (`CNT-2025-0001`).
    pub code: String,
    pub contact_type: ContactType,
    pub status: ContactStatus,
    pub civility: Option<Civility>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[ts(as = "Option<String>")]
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub email_opt_in: bool,
    pub sms_opt_in: bool,
    pub preferred_contact: PreferredContact,
    pub preferred_language: PreferredLanguage,
    pub priority: ContactPriority,

    /// Owning customer (the singleton scope).
    pub customer_id: String,
    /// At most one primary contact per customer.
    pub is_primary: bool,
    pub is_decision_maker: bool,

    #[ts(as = "Option<String>")]
    pub last_contact_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub next_contact_at: Option<DateTime<Utc>>,
    pub last_contact_note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// `M. Jean Dupont`: civility, first name, last name.
    pub fn full_name(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(civility) = self.civility {
            parts.push(civility.abbreviation().to_string());
        }
        parts.push(self.first_name.clone());
        if let Some(last) = self.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(last.to_string());
        }
        parts.join(" ")
    }

    /// Full name followed by ` - job title` when known.
    pub fn display_name(&self) -> String {
        match self.job_title.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(title) => format!("{} - {}", self.full_name(), title),
            None => self.full_name(),
        }
    }

    /// `line1, line2, postal city, country`; empty without a first line.
    pub fn formatted_address(&self) -> String {
        let Some(line1) = self
            .address_line1
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return String::new();
        };
        let mut parts = vec![line1.to_string()];
        if let Some(line2) = self.address_line2.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(line2.to_string());
        }
        if let (Some(postal), Some(city)) = (&self.postal_code, &self.city) {
            parts.push(format!("{postal} {city}"));
        }
        if let Some(country) = self.country.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(country.to_string());
        }
        parts.join(", ")
    }

    /// Follow-up date already passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_contact_at.is_some_and(|next| next < now)
    }

    /// Whole days since the last interaction, `None` if never contacted.
    pub fn days_since_last_contact(&self, today: NaiveDate) -> Option<i64> {
        self.last_contact_at
            .map(|last| (today - last.date_naive()).num_days())
    }
}

/// Caller-supplied contact fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactInput {
    /// `None` generates a `CNT-` code on create, keeps the current one on update.
    pub code: Option<String>,
    pub contact_type: ContactType,
    pub status: ContactStatus,
    pub civility: Option<Civility>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[ts(as = "Option<String>")]
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub email_opt_in: bool,
    pub sms_opt_in: bool,
    pub preferred_contact: PreferredContact,
    pub preferred_language: PreferredLanguage,
    pub priority: ContactPriority,
    pub customer_id: String,
    pub is_primary: bool,
    pub is_decision_maker: bool,
    #[ts(as = "Option<String>")]
    pub last_contact_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub next_contact_at: Option<DateTime<Utc>>,
}

impl ContactInput {
    pub fn new(customer_id: impl Into<String>, first_name: impl Into<String>) -> Self {
        ContactInput {
            code: None,
            contact_type: ContactType::Contact,
            status: ContactStatus::Active,
            civility: None,
            first_name: first_name.into(),
            last_name: None,
            job_title: None,
            department: None,
            email: None,
            phone: None,
            mobile: None,
            address_line1: None,
            address_line2: None,
            postal_code: None,
            city: None,
            country: None,
            birth_date: None,
            notes: None,
            email_opt_in: true,
            sms_opt_in: true,
            preferred_contact: PreferredContact::Email,
            preferred_language: PreferredLanguage::French,
            priority: ContactPriority::Normal,
            customer_id: customer_id.into(),
            is_primary: false,
            is_decision_maker: false,
            last_contact_at: None,
            next_contact_at: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactFilter {
    pub status: Option<ContactStatus>,
    pub contact_type: Option<ContactType>,
    pub customer_id: Option<String>,
    pub priority: Option<ContactPriority>,
    pub is_primary: Option<bool>,
    /// Case-insensitive match on code, names, email or job title.
    pub search: Option<String>,
}
