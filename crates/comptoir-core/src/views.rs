//! # Read Models
//!
//! Enriched views returned by the domain services. Building a view is a
//! pure derivation over already-loaded rows; nothing here touches storage.
//!
//! ```text
//! Category + arena + counts  ──►  CategoryView  (depth, full path, counts)
//! Product  + arena           ──►  ProductView   (VAT, margin, stock flags)
//! Contact  + Customer + now  ──►  ContactView   (names, overdue, recency)
//! Customer + addresses + ... ──►  CustomerView  (labels, primary contact)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::hierarchy::CategoryArena;
use crate::types::{Address, Category, Contact, Customer, Product};

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryView {
    pub category: Category,
    pub parent_code: Option<String>,
    pub parent_name: Option<String>,
    pub depth: u32,
    pub full_path: String,
    pub children_count: u32,
    pub product_count: i64,
}

impl CategoryView {
    pub fn build(arena: &CategoryArena, category: &Category, product_count: i64) -> CoreResult<Self> {
        let parent = category.parent_id.as_deref().and_then(|p| arena.get(p));
        Ok(CategoryView {
            parent_code: parent.map(|p| p.code.clone()),
            parent_name: parent.map(|p| p.name.clone()),
            depth: arena.depth(&category.id)? as u32,
            full_path: arena.full_path(&category.id)?,
            children_count: arena.children(Some(&category.id)).len() as u32,
            product_count,
            category: category.clone(),
        })
    }
}

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductView {
    pub product: Product,
    pub category_code: Option<String>,
    pub category_name: Option<String>,
    pub category_path: Option<String>,
    pub price_with_vat_cents: i64,
    pub vat_amount_cents: i64,
    /// Gross margin in basis points, when a cost and a price are known.
    pub margin_bps: Option<i64>,
    pub low_stock: bool,
    pub out_of_stock: bool,
}

impl ProductView {
    /// The category fields stay `None` if the arena does not hold it.
    pub fn build(arena: &CategoryArena, product: &Product) -> Self {
        let category = arena.get(&product.category_id);
        ProductView {
            category_code: category.map(|c| c.code.clone()),
            category_name: category.map(|c| c.name.clone()),
            category_path: category.and_then(|c| arena.full_path(&c.id).ok()),
            price_with_vat_cents: product.price_with_vat().cents(),
            vat_amount_cents: product.vat_amount().cents(),
            margin_bps: product
                .cost_price_cents
                .and_then(|cost| product.price().margin_bps(crate::money::Money::from_cents(cost))),
            low_stock: product.is_low_stock(),
            out_of_stock: product.is_out_of_stock(),
            product: product.clone(),
        }
    }
}

// =============================================================================
// Contact
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactView {
    pub contact: Contact,
    pub customer_code: String,
    pub customer_name: String,
    pub full_name: String,
    pub display_name: String,
    pub formatted_address: String,
    pub overdue: bool,
    pub days_since_last_contact: Option<i64>,
}

impl ContactView {
    pub fn build(contact: &Contact, customer: &Customer, now: DateTime<Utc>) -> Self {
        ContactView {
            customer_code: customer.code.clone(),
            customer_name: customer.company_name.clone(),
            full_name: contact.full_name(),
            display_name: contact.display_name(),
            formatted_address: contact.formatted_address(),
            overdue: contact.is_overdue(now),
            days_since_last_contact: contact.days_since_last_contact(now.date_naive()),
            contact: contact.clone(),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerView {
    pub customer: Customer,
    pub status_label: String,
    pub type_label: String,
    pub contact_name: Option<String>,
    /// Default address first.
    pub addresses: Vec<Address>,
    pub default_address: Option<String>,
    pub contact_count: i64,
    pub primary_contact: Option<String>,
}

impl CustomerView {
    pub fn build(
        customer: &Customer,
        mut addresses: Vec<Address>,
        contact_count: i64,
        primary_contact: Option<&Contact>,
    ) -> Self {
        addresses.sort_by_key(|a| !a.is_default);
        CustomerView {
            status_label: customer.status.label().to_string(),
            type_label: customer.customer_type.label().to_string(),
            contact_name: customer.contact_name(),
            default_address: addresses
                .iter()
                .find(|a| a.is_default)
                .map(Address::one_line),
            addresses,
            contact_count,
            primary_contact: primary_contact.map(Contact::display_name),
            customer: customer.clone(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddressType, CustomerStatus, CustomerType, ProductStatus, ProductType};

    fn category(id: &str, name: &str, parent: Option<&str>) -> Category {
        let now = Utc::now();
        Category {
            id: id.to_string(),
            code: format!("CAT-{id}"),
            name: name.to_string(),
            description: None,
            parent_id: parent.map(str::to_string),
            sort_order: 10,
            active: true,
            image_url: None,
            icon_class: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: "c1".to_string(),
            code: "CLI-2025-0001".to_string(),
            company_name: "Acme".to_string(),
            contact_first_name: Some("Jean".to_string()),
            contact_last_name: Some("Dupont".to_string()),
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
            created_at: now,
            updated_at: now,
        }
    }

    fn address(id: &str, is_default: bool) -> Address {
        let now = Utc::now();
        Address {
            id: id.to_string(),
            customer_id: "c1".to_string(),
            address_type: AddressType::Both,
            label: None,
            street1: format!("{id} rue Lafayette"),
            street2: None,
            zip_code: "75009".to_string(),
            city: "Paris".to_string(),
            state: None,
            country_code: "FR".to_string(),
            is_default,
            active: true,
            contact_name: None,
            contact_phone: None,
            contact_email: None,
            delivery_instructions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_category_view() {
        let arena = CategoryArena::new(vec![
            category("root", "Boissons", None),
            category("child", "Sodas", Some("root")),
        ]);
        let child = arena.get("child").unwrap().clone();
        let view = CategoryView::build(&arena, &child, 4).unwrap();
        assert_eq!(view.depth, 1);
        assert_eq!(view.full_path, "Boissons > Sodas");
        assert_eq!(view.parent_name.as_deref(), Some("Boissons"));
        assert_eq!(view.product_count, 4);
        assert_eq!(view.children_count, 0);
    }

    #[test]
    fn test_product_view() {
        let arena = CategoryArena::new(vec![category("root", "Boissons", None)]);
        let now = Utc::now();
        let product = Product {
            id: "p1".to_string(),
            code: "PRD-2025-0001".to_string(),
            name: "Eau".to_string(),
            description: None,
            active: true,
            product_type: ProductType::Product,
            status: ProductStatus::Available,
            reference: None,
            sku: None,
            ean: None,
            unit_price_cents: 2000,
            cost_price_cents: Some(1500),
            vat_rate_bps: 550,
            stock_managed: true,
            stock_quantity: 2,
            min_stock_level: 5,
            max_stock_level: 50,
            unit: "pce".to_string(),
            weight_grams: None,
            image_url: None,
            category_id: "root".to_string(),
            created_at: now,
            updated_at: now,
        };
        let view = ProductView::build(&arena, &product);
        assert_eq!(view.vat_amount_cents, 110);
        assert_eq!(view.price_with_vat_cents, 2110);
        assert_eq!(view.margin_bps, Some(2500));
        assert!(view.low_stock);
        assert!(!view.out_of_stock);
        assert_eq!(view.category_path.as_deref(), Some("Boissons"));
    }

    #[test]
    fn test_customer_view_puts_default_first() {
        let view = CustomerView::build(
            &customer(),
            vec![address("1", false), address("2", true)],
            0,
            None,
        );
        assert_eq!(view.addresses[0].id, "2");
        assert_eq!(
            view.default_address.as_deref(),
            Some("2 rue Lafayette, 75009 Paris, FR")
        );
        assert_eq!(view.contact_name.as_deref(), Some("Jean Dupont"));
        assert_eq!(view.status_label, "Actif");
    }
}
