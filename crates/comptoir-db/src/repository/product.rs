//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## Key Operations
//! - CRUD with natural-key lookups (code, sku)
//! - Stock updates
//! - Filtered, paginated search
//! - Low stock / out of stock listings

use chrono::{DateTime, Utc};
use comptoir_core::page::{Page, PageRequest};
use comptoir_core::types::{Product, ProductFilter, ProductStatus};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{paginate, push_search};
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, code, name, description, active, product_type, status, reference, sku, ean, \
                       unit_price_cents, cost_price_cents, vat_rate_bps, stock_managed, stock_quantity, \
                       min_stock_level, max_stock_level, unit, weight_grams, image_url, category_id, \
                       created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.find_by_sku(db.pool(), "COKE-330").await?;
/// let low = repo.low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<Product>> {
        self.find_one(ex, "id", id).await
    }

    pub async fn find_by_code<'e>(&self, ex: impl SqliteExecutor<'e>, code: &str) -> DbResult<Option<Product>> {
        self.find_one(ex, "code", code).await
    }

    pub async fn find_by_sku<'e>(&self, ex: impl SqliteExecutor<'e>, sku: &str) -> DbResult<Option<Product>> {
        self.find_one(ex, "sku", sku).await
    }

    async fn find_one<'e>(&self, ex: impl SqliteExecutor<'e>, column: &str, value: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE {column} = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(value)
            .fetch_optional(ex)
            .await?;
        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// - `UniqueViolation` if code, sku or ean already exists
    /// - `ForeignKeyViolation` if the category does not exist
    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, description, active, product_type, status, reference, sku, ean,
                unit_price_cents, cost_price_cents, vat_rate_bps, stock_managed, stock_quantity,
                min_stock_level, max_stock_level, unit, weight_grams, image_url, category_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.active)
        .bind(product.product_type)
        .bind(product.status)
        .bind(&product.reference)
        .bind(&product.sku)
        .bind(&product.ean)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.vat_rate_bps)
        .bind(product.stock_managed)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(product.max_stock_level)
        .bind(&product.unit)
        .bind(product.weight_grams)
        .bind(&product.image_url)
        .bind(&product.category_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(ex)
        .await?;

        debug!(id = %product.id, code = %product.code, "Inserted product");
        Ok(())
    }

    /// Replaces every mutable column.
    pub async fn update<'e>(&self, ex: impl SqliteExecutor<'e>, product: &Product) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2, name = ?3, description = ?4, active = ?5, product_type = ?6,
                status = ?7, reference = ?8, sku = ?9, ean = ?10, unit_price_cents = ?11,
                cost_price_cents = ?12, vat_rate_bps = ?13, stock_managed = ?14,
                stock_quantity = ?15, min_stock_level = ?16, max_stock_level = ?17,
                unit = ?18, weight_grams = ?19, image_url = ?20, category_id = ?21,
                updated_at = ?22
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.active)
        .bind(product.product_type)
        .bind(product.status)
        .bind(&product.reference)
        .bind(&product.sku)
        .bind(&product.ean)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.vat_rate_bps)
        .bind(product.stock_managed)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(product.max_stock_level)
        .bind(&product.unit)
        .bind(product.weight_grams)
        .bind(&product.image_url)
        .bind(&product.category_id)
        .bind(product.updated_at)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }
        debug!(id = %product.id, "Updated product");
        Ok(())
    }

    /// Sets the stock level and the matching availability status.
    pub async fn update_stock<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        id: &str,
        quantity: i32,
        status: ProductStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(status)
        .bind(now)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        debug!(id, quantity, "Updated stock");
        Ok(())
    }

    pub async fn delete<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        debug!(id, "Deleted product");
        Ok(())
    }

    pub async fn list_by_category(&self, category_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE category_id = ?1 ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Filtered, paginated search ordered by name.
    pub async fn search(&self, filter: &ProductFilter, page: PageRequest) -> DbResult<Page<Product>> {
        paginate(&self.pool, COLUMNS, "products", "name, code", page, |qb| {
            if let Some(active) = filter.active {
                qb.push(" AND active = ");
                qb.push_bind(active);
            }
            if let Some(category_id) = &filter.category_id {
                qb.push(" AND category_id = ");
                qb.push_bind(category_id.clone());
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
            if let Some(product_type) = filter.product_type {
                qb.push(" AND product_type = ");
                qb.push_bind(product_type);
            }
            if let Some(min) = filter.min_price_cents {
                qb.push(" AND unit_price_cents >= ");
                qb.push_bind(min);
            }
            if let Some(max) = filter.max_price_cents {
                qb.push(" AND unit_price_cents <= ");
                qb.push_bind(max);
            }
            if let Some(term) = &filter.search {
                push_search(qb, &["code", "name", "reference", "sku", "ean"], term);
            }
        })
        .await
    }

    /// Active stock-managed products at or below their reorder threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM products \
             WHERE active = 1 AND stock_managed = 1 AND stock_quantity <= min_stock_level \
             ORDER BY stock_quantity, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        Ok(products)
    }

    pub async fn out_of_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM products \
             WHERE active = 1 AND stock_managed = 1 AND stock_quantity <= 0 \
             ORDER BY name"
        );
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// `(all, active)`.
    pub async fn counts(&self) -> DbResult<(i64, i64)> {
        let counts = sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(active), 0) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(counts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
