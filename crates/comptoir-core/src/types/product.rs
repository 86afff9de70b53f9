//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, VatRate};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    #[default]
    Product,
    Service,
    Variant,
    Bundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Available,
    OutOfStock,
    Discontinued,
    Pending,
    Draft,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry. Belongs to exactly one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub product_type: ProductType,
    pub status: ProductStatus,

    /// Supplier or internal reference, free form.
    pub reference: Option<String>,
    /// Stock Keeping Unit, unique when present.
    pub sku: Option<String>,
    /// EAN-13 / EAN-8 barcode, unique when present.
    pub ean: Option<String>,

    /// Net selling price in cents.
    pub unit_price_cents: i64,
    pub cost_price_cents: Option<i64>,
    /// VAT in basis points (2000 = 20 %).
    pub vat_rate_bps: u32,

    pub stock_managed: bool,
    pub stock_quantity: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    /// Sales unit (`pce`, `kg`, `h`, ...).
    pub unit: String,
    pub weight_grams: Option<i64>,
    pub image_url: Option<String>,

    pub category_id: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn vat_rate(&self) -> VatRate {
        VatRate::from_bps(self.vat_rate_bps)
    }

    pub fn price_with_vat(&self) -> Money {
        self.price().with_vat(self.vat_rate())
    }

    pub fn vat_amount(&self) -> Money {
        self.price().vat(self.vat_rate())
    }

    /// Stock at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_managed && self.stock_quantity <= self.min_stock_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_managed && self.stock_quantity <= 0
    }
}

/// Caller-supplied product fields for create/update.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    /// `None` generates a `PRD-` code on create, keeps the current one on update.
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub product_type: ProductType,
    pub status: ProductStatus,
    pub reference: Option<String>,
    pub sku: Option<String>,
    pub ean: Option<String>,
    pub unit_price_cents: i64,
    pub cost_price_cents: Option<i64>,
    pub vat_rate_bps: u32,
    pub stock_managed: bool,
    pub stock_quantity: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub unit: String,
    pub weight_grams: Option<i64>,
    pub image_url: Option<String>,
    pub category_id: String,
}

impl ProductInput {
    /// Active, available, unmanaged-stock product at the standard VAT rate.
    pub fn new(name: impl Into<String>, category_id: impl Into<String>, unit_price_cents: i64) -> Self {
        ProductInput {
            code: None,
            name: name.into(),
            description: None,
            active: true,
            product_type: ProductType::Product,
            status: ProductStatus::Available,
            reference: None,
            sku: None,
            ean: None,
            unit_price_cents,
            cost_price_cents: None,
            vat_rate_bps: VatRate::STANDARD.bps(),
            stock_managed: false,
            stock_quantity: 0,
            min_stock_level: 0,
            max_stock_level: 0,
            unit: "pce".to_string(),
            weight_grams: None,
            image_url: None,
            category_id: category_id.into(),
        }
    }
}

/// Search criteria for product listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductFilter {
    pub active: Option<bool>,
    pub category_id: Option<String>,
    pub status: Option<ProductStatus>,
    pub product_type: Option<ProductType>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    /// Case-insensitive match on code, name, reference, sku or ean.
    pub search: Option<String>,
}
