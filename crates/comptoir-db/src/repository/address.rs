//! # Address Repository
//!
//! Postal addresses of a customer. The "one default address" rule lives in
//! [`crate::singleton::ADDRESS_DEFAULT`]; this module only moves rows.

use chrono::{DateTime, Utc};
use comptoir_core::types::Address;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, customer_id, address_type, label, street1, street2, zip_code, city, state, \
                       country_code, is_default, active, contact_name, contact_phone, contact_email, \
                       delivery_instructions, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<Address>> {
        let sql = format!("SELECT {COLUMNS} FROM addresses WHERE id = ?1");
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(address)
    }

    /// Addresses of a customer, default first.
    pub async fn list_for_customer<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        customer_id: &str,
    ) -> DbResult<Vec<Address>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM addresses WHERE customer_id = ?1 \
             ORDER BY is_default DESC, created_at, id"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(customer_id)
            .fetch_all(ex)
            .await?;
        Ok(addresses)
    }

    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, address: &Address) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, customer_id, address_type, label, street1, street2, zip_code, city, state,
                country_code, is_default, active, contact_name, contact_phone, contact_email,
                delivery_instructions, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&address.id)
        .bind(&address.customer_id)
        .bind(address.address_type)
        .bind(&address.label)
        .bind(&address.street1)
        .bind(&address.street2)
        .bind(&address.zip_code)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country_code)
        .bind(address.is_default)
        .bind(address.active)
        .bind(&address.contact_name)
        .bind(&address.contact_phone)
        .bind(&address.contact_email)
        .bind(&address.delivery_instructions)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(ex)
        .await?;

        debug!(id = %address.id, customer_id = %address.customer_id, "Inserted address");
        Ok(())
    }

    /// Replaces every column except owner and flag; both are managed by
    /// the singleton enforcer.
    pub async fn update<'e>(&self, ex: impl SqliteExecutor<'e>, address: &Address) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE addresses SET
                address_type = ?2, label = ?3, street1 = ?4, street2 = ?5, zip_code = ?6,
                city = ?7, state = ?8, country_code = ?9, active = ?10, contact_name = ?11,
                contact_phone = ?12, contact_email = ?13, delivery_instructions = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(&address.id)
        .bind(address.address_type)
        .bind(&address.label)
        .bind(&address.street1)
        .bind(&address.street2)
        .bind(&address.zip_code)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country_code)
        .bind(address.active)
        .bind(&address.contact_name)
        .bind(&address.contact_phone)
        .bind(&address.contact_email)
        .bind(&address.delivery_instructions)
        .bind(address.updated_at)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", &address.id));
        }
        Ok(())
    }

    /// Unsets the default flag of one address.
    pub async fn clear_default<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE addresses SET is_default = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(ex)
            .await?;
        Ok(())
    }

    pub async fn delete<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", id));
        }
        debug!(id, "Deleted address");
        Ok(())
    }

    pub async fn count_for_customer(&self, customer_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM addresses WHERE customer_id = ?1")
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
