//! # Customer Service
//!
//! Customers and their addresses.
//!
//! ## Default Address
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_address(default)   clear_for_new_flagged ─► INSERT (flag = 1)      │
//! │  set_default_address    set_flag (clear others ─► set this one)         │
//! │  delete_address         guard_departure ─► DELETE                       │
//! │                                                                         │
//! │  every path: one transaction, replayed on lock contention               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use comptoir_core::validation::{
    non_blank, validate_address_input, validate_customer_input, validate_search_query,
};
use comptoir_core::{
    new_id, Address, AddressInput, Customer, CustomerFilter, CustomerInput, CustomerStatus,
    CustomerView, Page, PageRequest, SequenceType, ValidationError,
};
use comptoir_db::{DbError, ADDRESS_DEFAULT};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustomerCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub suspended: i64,
    pub archived: i64,
}

#[derive(Clone)]
pub struct CustomerService {
    ctx: ServiceContext,
}

impl CustomerService {
    pub fn new(ctx: ServiceContext) -> Self {
        CustomerService { ctx }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Creates the customer together with its initial addresses.
    pub async fn create(&self, input: CustomerInput) -> ServiceResult<Customer> {
        validate_customer_input(&input)?;
        let customer = self.ctx.run("customer.create", || self.create_once(&input)).await?;
        info!(
            id = %customer.id,
            code = %customer.code,
            addresses = input.addresses.len(),
            "Customer created"
        );
        Ok(customer)
    }

    async fn create_once(&self, input: &CustomerInput) -> ServiceResult<Customer> {
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let code = match non_blank(input.code.as_deref()) {
            Some(code) => code.to_string(),
            None => self.ctx.sequences().next_for(&mut tx, SequenceType::Customer).await?,
        };
        let customer = build_customer(new_id(), code, input, now, now);
        self.ctx
            .db()
            .customers()
            .insert(&mut *tx, &customer)
            .await
            .map_err(|e| duplicate_value(e, &customer))?;

        // Validation allows at most one default among these.
        for address_input in &input.addresses {
            let address = build_address(new_id(), &customer.id, address_input, now, now);
            self.ctx.db().addresses().insert(&mut *tx, &address).await?;
        }

        tx.commit().await?;
        Ok(customer)
    }

    /// Replaces the customer fields. Addresses are managed separately.
    pub async fn update(&self, id: &str, input: CustomerInput) -> ServiceResult<Customer> {
        validate_customer_input(&input)?;
        let customer = self.ctx.run("customer.update", || self.update_once(id, &input)).await?;
        info!(id, code = %customer.code, "Customer updated");
        Ok(customer)
    }

    async fn update_once(&self, id: &str, input: &CustomerInput) -> ServiceResult<Customer> {
        let repo = self.ctx.db().customers();
        let mut tx = self.ctx.db().pool().begin().await?;

        let current = repo
            .get(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))?;
        let code = non_blank(input.code.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| current.code.clone());
        let customer = build_customer(current.id, code, input, current.created_at, self.ctx.now());
        repo.update(&mut *tx, &customer)
            .await
            .map_err(|e| duplicate_value(e, &customer))?;
        tx.commit().await?;
        Ok(customer)
    }

    /// Deletes the customer with its addresses and contacts.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.ctx
            .run("customer.delete", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                self.ctx.db().customers().delete(&mut *tx, id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id, "Customer deleted");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Customer> {
        self.ctx
            .db()
            .customers()
            .get(self.ctx.db().pool(), id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    pub async fn find_by_code(&self, code: &str) -> ServiceResult<Customer> {
        self.ctx
            .db()
            .customers()
            .find_by_code(self.ctx.db().pool(), code.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", code))
    }

    pub async fn search(&self, filter: CustomerFilter, page: PageRequest) -> ServiceResult<Page<Customer>> {
        let filter = CustomerFilter {
            search: validate_search_query(filter.search.as_deref())?,
            ..filter
        };
        Ok(self.ctx.db().customers().search(&filter, page).await?)
    }

    pub async fn list_active(&self) -> ServiceResult<Vec<Customer>> {
        Ok(self.ctx.db().customers().list_active().await?)
    }

    pub async fn counts(&self) -> ServiceResult<CustomerCounts> {
        let repo = self.ctx.db().customers();
        Ok(CustomerCounts {
            total: repo.count().await?,
            active: repo.count_by_status(CustomerStatus::Active).await?,
            inactive: repo.count_by_status(CustomerStatus::Inactive).await?,
            suspended: repo.count_by_status(CustomerStatus::Suspended).await?,
            archived: repo.count_by_status(CustomerStatus::Archived).await?,
        })
    }

    /// Read model with addresses, contact count and primary contact.
    pub async fn view(&self, id: &str) -> ServiceResult<CustomerView> {
        let pool = self.ctx.db().pool();
        let customer = self.get(id).await?;
        let addresses = self.ctx.db().addresses().list_for_customer(pool, id).await?;
        let contact_count = self.ctx.db().contacts().count_by_customer(pool, id).await?;
        let primary = self.ctx.db().contacts().find_primary(pool, id).await?;
        Ok(CustomerView::build(&customer, addresses, contact_count, primary.as_ref()))
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Addresses of a customer, default first.
    pub async fn list_addresses(&self, customer_id: &str) -> ServiceResult<Vec<Address>> {
        let pool = self.ctx.db().pool();
        if !self.ctx.db().customers().exists(pool, customer_id).await? {
            return Err(ServiceError::not_found("Customer", customer_id));
        }
        Ok(self.ctx.db().addresses().list_for_customer(pool, customer_id).await?)
    }

    /// Adds an address. A default address takes the flag from the previous one.
    pub async fn add_address(&self, customer_id: &str, input: AddressInput) -> ServiceResult<Address> {
        validate_address_input(&input)?;
        let address = self
            .ctx
            .run("customer.add_address", || self.add_address_once(customer_id, &input))
            .await?;
        info!(id = %address.id, customer_id, default = address.is_default, "Address added");
        Ok(address)
    }

    async fn add_address_once(&self, customer_id: &str, input: &AddressInput) -> ServiceResult<Address> {
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        if input.is_default {
            ADDRESS_DEFAULT.clear_for_new_flagged(&mut tx, customer_id, now).await?;
        }
        self.require_customer(&mut tx, customer_id).await?;

        let address = build_address(new_id(), customer_id, input, now, now);
        self.ctx.db().addresses().insert(&mut *tx, &address).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// Replaces the address fields; `is_default` moves the flag to or from it.
    pub async fn update_address(&self, address_id: &str, input: AddressInput) -> ServiceResult<Address> {
        validate_address_input(&input)?;
        let address = self
            .ctx
            .run("customer.update_address", || self.update_address_once(address_id, &input))
            .await?;
        info!(id = address_id, "Address updated");
        Ok(address)
    }

    async fn update_address_once(&self, address_id: &str, input: &AddressInput) -> ServiceResult<Address> {
        let repo = self.ctx.db().addresses();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let current = repo
            .get(&mut *tx, address_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address", address_id))?;

        match (current.is_default, input.is_default) {
            (false, true) => {
                ADDRESS_DEFAULT
                    .set_flag(&mut tx, address_id, &current.customer_id, now)
                    .await?
            }
            (true, false) => repo.clear_default(&mut *tx, address_id, now).await?,
            _ => {}
        }

        let address = build_address(current.id, &current.customer_id, input, current.created_at, now);
        repo.update(&mut *tx, &address).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// Refused for the default address while the customer has others.
    pub async fn delete_address(&self, address_id: &str) -> ServiceResult<()> {
        self.ctx
            .run("customer.delete_address", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                ADDRESS_DEFAULT.guard_departure(&mut tx, address_id).await?;
                self.ctx.db().addresses().delete(&mut *tx, address_id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id = address_id, "Address deleted");
        Ok(())
    }

    /// Makes `address_id` the only default address of `customer_id`.
    pub async fn set_default_address(&self, address_id: &str, customer_id: &str) -> ServiceResult<()> {
        self.ctx
            .run("customer.set_default_address", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                ADDRESS_DEFAULT
                    .set_flag(&mut tx, address_id, customer_id, self.ctx.now())
                    .await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id = address_id, customer_id, "Default address set");
        Ok(())
    }

    async fn require_customer(&self, conn: &mut SqliteConnection, customer_id: &str) -> ServiceResult<()> {
        if !self.ctx.db().customers().exists(&mut *conn, customer_id).await? {
            return Err(ValidationError::missing("Customer", "customer_id", customer_id).into());
        }
        Ok(())
    }
}

fn build_customer(
    id: String,
    code: String,
    input: &CustomerInput,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Customer {
    Customer {
        id,
        code,
        company_name: input.company_name.trim().to_string(),
        contact_first_name: clean(&input.contact_first_name),
        contact_last_name: clean(&input.contact_last_name),
        email: clean(&input.email).map(|e| e.to_lowercase()),
        phone: clean(&input.phone),
        mobile: clean(&input.mobile),
        siret: clean(&input.siret),
        vat_number: clean(&input.vat_number),
        credit_limit_cents: input.credit_limit_cents,
        payment_term_days: input.payment_term_days,
        status: input.status,
        customer_type: input.customer_type,
        notes: clean(&input.notes),
        created_at,
        updated_at,
    }
}

fn build_address(
    id: String,
    customer_id: &str,
    input: &AddressInput,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Address {
    Address {
        id,
        customer_id: customer_id.to_string(),
        address_type: input.address_type,
        label: clean(&input.label),
        street1: input.street1.trim().to_string(),
        street2: clean(&input.street2),
        zip_code: input.zip_code.trim().to_string(),
        city: input.city.trim().to_string(),
        state: clean(&input.state),
        country_code: input.country_code.trim().to_uppercase(),
        is_default: input.is_default,
        active: input.active,
        contact_name: clean(&input.contact_name),
        contact_phone: clean(&input.contact_phone),
        contact_email: clean(&input.contact_email),
        delivery_instructions: clean(&input.delivery_instructions),
        created_at,
        updated_at,
    }
}

fn duplicate_value(err: DbError, customer: &Customer) -> DbError {
    let value = match &err {
        DbError::UniqueViolation { field, .. } => match field.as_str() {
            "customers.email" => customer.email.clone(),
            "customers.siret" => customer.siret.clone(),
            _ => Some(customer.code.clone()),
        },
        _ => None,
    };
    match value {
        Some(value) => err.with_value(value),
        None => err,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::NaiveDate;
    use comptoir_core::FixedClock;
    use comptoir_db::{Database, DbConfig};
    use std::sync::Arc;

    async fn service() -> CustomerService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        CustomerService::new(ServiceContext::new(db).with_clock(Arc::new(clock)))
    }

    async fn default_ids(service: &CustomerService, customer_id: &str) -> Vec<String> {
        service
            .list_addresses(customer_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect()
    }

    #[tokio::test]
    async fn test_codes_follow_yearly_sequence() {
        let service = service().await;
        let mut codes = Vec::new();
        for i in 0..5 {
            let customer = service.create(CustomerInput::new(format!("Client {i}"))).await.unwrap();
            codes.push(customer.code);
        }
        assert_eq!(codes[0], "CLI-2025-0001");
        assert_eq!(codes[4], "CLI-2025-0005");

        let explicit = CustomerInput {
            code: Some("VIP-1".to_string()),
            ..CustomerInput::new("Maison Dupont")
        };
        assert_eq!(service.create(explicit).await.unwrap().code, "VIP-1");
        assert_eq!(service.counts().await.unwrap().total, 6);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let service = service().await;
        let input = CustomerInput {
            email: Some("contact@acme.fr".to_string()),
            ..CustomerInput::new("Acme")
        };
        service.create(input.clone()).await.unwrap();

        let err = service
            .create(CustomerInput {
                email: Some("Contact@Acme.fr".to_string()),
                ..input
            })
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(ValidationError::Duplicate { field, value }) => {
                assert_eq!(field, "email");
                assert_eq!(value, "contact@acme.fr");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_default_address() {
        let service = service().await;
        let customer = service
            .create(CustomerInput {
                addresses: vec![
                    AddressInput::new("1 rue A", "75001", "Paris").as_default(),
                    AddressInput::new("2 rue B", "69001", "Lyon"),
                ],
                ..CustomerInput::new("Acme")
            })
            .await
            .unwrap();
        let first = default_ids(&service, &customer.id).await;
        assert_eq!(first.len(), 1);

        let added = service
            .add_address(&customer.id, AddressInput::new("3 rue C", "13001", "Marseille").as_default())
            .await
            .unwrap();
        assert_eq!(default_ids(&service, &customer.id).await, vec![added.id.clone()]);

        service.set_default_address(&first[0], &customer.id).await.unwrap();
        assert_eq!(default_ids(&service, &customer.id).await, first);

        // Idempotent
        service.set_default_address(&first[0], &customer.id).await.unwrap();
        assert_eq!(default_ids(&service, &customer.id).await, first);

        let view = service.view(&customer.id).await.unwrap();
        assert_eq!(view.addresses.len(), 3);
        assert_eq!(view.default_address.as_deref(), Some("1 rue A, 75001 Paris, FR"));
    }

    #[tokio::test]
    async fn test_default_address_rules() {
        let service = service().await;
        let acme = service.create(CustomerInput::new("Acme")).await.unwrap();
        let other = service.create(CustomerInput::new("Globex")).await.unwrap();

        let main = service
            .add_address(&acme.id, AddressInput::new("1 rue A", "75001", "Paris").as_default())
            .await
            .unwrap();
        let spare = service
            .add_address(&acme.id, AddressInput::new("2 rue B", "75002", "Paris"))
            .await
            .unwrap();

        let err = service.delete_address(&main.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::FlagReassignRequired { .. })
        ));

        let err = service.set_default_address(&main.id, &other.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::ScopeMismatch { .. })
        ));

        let err = service.set_default_address("nope", &acme.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        // Unflagging through update leaves zero defaults, which is legal.
        service
            .update_address(&main.id, AddressInput::new("1 rue A", "75001", "Paris"))
            .await
            .unwrap();
        assert!(default_ids(&service, &acme.id).await.is_empty());

        service.delete_address(&spare.id).await.unwrap();
        service.delete_address(&main.id).await.unwrap();
        assert!(service.list_addresses(&acme.id).await.unwrap().is_empty());

        let err = service
            .add_address("ghost", AddressInput::new("1 rue A", "75001", "Paris"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingRelation { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_and_search() {
        let service = service().await;
        let acme = service
            .create(CustomerInput {
                addresses: vec![AddressInput::new("1 rue A", "75001", "Paris").as_default()],
                ..CustomerInput::new("Acme")
            })
            .await
            .unwrap();
        service
            .create(CustomerInput {
                status: CustomerStatus::Suspended,
                ..CustomerInput::new("Globex")
            })
            .await
            .unwrap();

        let filter = CustomerFilter {
            search: Some("acm".to_string()),
            ..Default::default()
        };
        let page = service.search(filter, PageRequest::first()).await.unwrap();
        assert_eq!(page.total_elements, 1);

        let counts = service.counts().await.unwrap();
        assert_eq!((counts.total, counts.active, counts.suspended), (2, 1, 1));
        assert_eq!(service.list_active().await.unwrap().len(), 1);

        service.delete(&acme.id).await.unwrap();
        assert_eq!(service.get(&acme.id).await.unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(service.ctx.db().addresses().count_for_customer(&acme.id).await.unwrap(), 0);
        assert_eq!(service.delete(&acme.id).await.unwrap_err().code(), ErrorCode::NotFound);
    }
}
