//! # Customer Repository
//!
//! Database operations for customers. Addresses and contacts hang off a
//! customer through `ON DELETE CASCADE` foreign keys.

use comptoir_core::page::{Page, PageRequest};
use comptoir_core::types::{Customer, CustomerFilter, CustomerStatus};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{paginate, push_search};
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, code, company_name, contact_first_name, contact_last_name, email, phone, \
                       mobile, siret, vat_number, credit_limit_cents, payment_term_days, status, \
                       customer_type, notes, created_at, updated_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(customer)
    }

    pub async fn find_by_code<'e>(&self, ex: impl SqliteExecutor<'e>, code: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {COLUMNS} FROM customers WHERE code = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(code)
            .fetch_optional(ex)
            .await?;
        Ok(customer)
    }

    pub async fn exists<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(found.is_some())
    }

    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, code, company_name, contact_first_name, contact_last_name, email, phone,
                mobile, siret, vat_number, credit_limit_cents, payment_term_days, status,
                customer_type, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.code)
        .bind(&customer.company_name)
        .bind(&customer.contact_first_name)
        .bind(&customer.contact_last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.mobile)
        .bind(&customer.siret)
        .bind(&customer.vat_number)
        .bind(customer.credit_limit_cents)
        .bind(customer.payment_term_days)
        .bind(customer.status)
        .bind(customer.customer_type)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(ex)
        .await?;

        debug!(id = %customer.id, code = %customer.code, "Inserted customer");
        Ok(())
    }

    pub async fn update<'e>(&self, ex: impl SqliteExecutor<'e>, customer: &Customer) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                code = ?2, company_name = ?3, contact_first_name = ?4, contact_last_name = ?5,
                email = ?6, phone = ?7, mobile = ?8, siret = ?9, vat_number = ?10,
                credit_limit_cents = ?11, payment_term_days = ?12, status = ?13,
                customer_type = ?14, notes = ?15, updated_at = ?16
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.code)
        .bind(&customer.company_name)
        .bind(&customer.contact_first_name)
        .bind(&customer.contact_last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.mobile)
        .bind(&customer.siret)
        .bind(&customer.vat_number)
        .bind(customer.credit_limit_cents)
        .bind(customer.payment_term_days)
        .bind(customer.status)
        .bind(customer.customer_type)
        .bind(&customer.notes)
        .bind(customer.updated_at)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }
        debug!(id = %customer.id, "Updated customer");
        Ok(())
    }

    /// Deletes the customer; its addresses and contacts cascade.
    pub async fn delete<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        debug!(id, "Deleted customer");
        Ok(())
    }

    pub async fn search(&self, filter: &CustomerFilter, page: PageRequest) -> DbResult<Page<Customer>> {
        paginate(&self.pool, COLUMNS, "customers", "company_name, code", page, |qb| {
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
            if let Some(customer_type) = filter.customer_type {
                qb.push(" AND customer_type = ");
                qb.push_bind(customer_type);
            }
            if let Some(term) = &filter.search {
                push_search(
                    qb,
                    &["code", "company_name", "email", "contact_first_name", "contact_last_name"],
                    term,
                );
            }
        })
        .await
    }

    pub async fn list_active(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {COLUMNS} FROM customers WHERE status = ?1 ORDER BY company_name");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(CustomerStatus::Active)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_by_status(&self, status: CustomerStatus) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
