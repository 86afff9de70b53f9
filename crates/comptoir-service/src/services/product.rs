//! # Product Service
//!
//! Catalog entries: codes, pricing, stock levels and category membership.

use comptoir_core::hierarchy::CategoryArena;
use comptoir_core::validation::{non_blank, validate_product_input, validate_search_query};
use comptoir_core::{
    new_id, Page, PageRequest, Product, ProductFilter, ProductInput, ProductStatus, ProductView,
    SequenceType, ValidationError,
};
use comptoir_db::DbError;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductCounts {
    pub total: i64,
    pub active: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
}

#[derive(Clone)]
pub struct ProductService {
    ctx: ServiceContext,
}

impl ProductService {
    pub fn new(ctx: ServiceContext) -> Self {
        ProductService { ctx }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn create(&self, input: ProductInput) -> ServiceResult<Product> {
        validate_product_input(&input)?;
        let product = self.ctx.run("product.create", || self.create_once(&input)).await?;
        info!(id = %product.id, code = %product.code, "Product created");
        Ok(product)
    }

    async fn create_once(&self, input: &ProductInput) -> ServiceResult<Product> {
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let code = match non_blank(input.code.as_deref()) {
            Some(code) => code.to_string(),
            None => self.ctx.sequences().next_for(&mut tx, SequenceType::Product).await?,
        };
        let category_id = input.category_id.trim();
        self.require_category(&mut tx, category_id).await?;

        let product = build(new_id(), code, input, now, now);
        self.ctx
            .db()
            .products()
            .insert(&mut *tx, &product)
            .await
            .map_err(|e| duplicate_value(e, &product))?;
        tx.commit().await?;
        Ok(product)
    }

    /// Replaces every field; a blank code keeps the current one.
    pub async fn update(&self, id: &str, input: ProductInput) -> ServiceResult<Product> {
        validate_product_input(&input)?;
        let product = self.ctx.run("product.update", || self.update_once(id, &input)).await?;
        info!(id, code = %product.code, "Product updated");
        Ok(product)
    }

    async fn update_once(&self, id: &str, input: &ProductInput) -> ServiceResult<Product> {
        let repo = self.ctx.db().products();
        let mut tx = self.ctx.db().pool().begin().await?;

        let current = repo
            .get(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        let category_id = input.category_id.trim();
        if category_id != current.category_id {
            self.require_category(&mut tx, category_id).await?;
        }

        let code = non_blank(input.code.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| current.code.clone());
        let product = build(current.id, code, input, current.created_at, self.ctx.now());
        repo.update(&mut *tx, &product)
            .await
            .map_err(|e| duplicate_value(e, &product))?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.ctx
            .run("product.delete", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                self.ctx.db().products().delete(&mut *tx, id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id, "Product deleted");
        Ok(())
    }

    /// Sets the stock level. Reaching zero marks the product out of stock;
    /// restocking an out-of-stock product makes it available again.
    pub async fn update_stock(&self, id: &str, quantity: i32) -> ServiceResult<Product> {
        let product = self
            .ctx
            .run("product.update_stock", || self.update_stock_once(id, quantity))
            .await?;
        info!(id, quantity, status = ?product.status, "Stock updated");
        Ok(product)
    }

    async fn update_stock_once(&self, id: &str, quantity: i32) -> ServiceResult<Product> {
        let repo = self.ctx.db().products();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let mut product = repo
            .get(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        if !product.stock_managed {
            return Err(ValidationError::BusinessRule(format!(
                "stock is not managed for product {}",
                product.code
            ))
            .into());
        }

        product.status = stock_status(product.status, quantity);
        product.stock_quantity = quantity;
        product.updated_at = now;
        repo.update_stock(&mut *tx, id, quantity, product.status, now).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn require_category(&self, conn: &mut SqliteConnection, category_id: &str) -> ServiceResult<()> {
        let exists = self.ctx.db().categories().get(&mut *conn, category_id).await?.is_some();
        if !exists {
            return Err(ValidationError::missing("Category", "category_id", category_id).into());
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> ServiceResult<Product> {
        self.ctx
            .db()
            .products()
            .get(self.ctx.db().pool(), id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    pub async fn find_by_code(&self, code: &str) -> ServiceResult<Product> {
        self.ctx
            .db()
            .products()
            .find_by_code(self.ctx.db().pool(), code.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", code))
    }

    pub async fn find_by_sku(&self, sku: &str) -> ServiceResult<Product> {
        self.ctx
            .db()
            .products()
            .find_by_sku(self.ctx.db().pool(), sku.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", sku))
    }

    pub async fn list_by_category(&self, category_id: &str) -> ServiceResult<Vec<Product>> {
        Ok(self.ctx.db().products().list_by_category(category_id).await?)
    }

    pub async fn search(&self, filter: ProductFilter, page: PageRequest) -> ServiceResult<Page<Product>> {
        if let (Some(min), Some(max)) = (filter.min_price_cents, filter.max_price_cents) {
            if min > max {
                return Err(ValidationError::BusinessRule(
                    "minimum price cannot exceed maximum price".to_string(),
                )
                .into());
            }
        }
        let filter = ProductFilter {
            search: validate_search_query(filter.search.as_deref())?,
            category_id: clean(&filter.category_id),
            ..filter
        };
        Ok(self.ctx.db().products().search(&filter, page).await?)
    }

    pub async fn low_stock(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.ctx.db().products().low_stock().await?)
    }

    pub async fn out_of_stock(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.ctx.db().products().out_of_stock().await?)
    }

    pub async fn counts(&self) -> ServiceResult<ProductCounts> {
        let repo = self.ctx.db().products();
        let (total, active) = repo.counts().await?;
        Ok(ProductCounts {
            total,
            active,
            low_stock: repo.low_stock().await?.len() as i64,
            out_of_stock: repo.out_of_stock().await?.len() as i64,
        })
    }

    /// Read model: category path, VAT, margin, stock flags.
    pub async fn view(&self, id: &str) -> ServiceResult<ProductView> {
        let product = self.get(id).await?;
        let arena = self.arena().await?;
        Ok(ProductView::build(&arena, &product))
    }

    pub async fn search_views(&self, filter: ProductFilter, page: PageRequest) -> ServiceResult<Page<ProductView>> {
        let found = self.search(filter, page).await?;
        let arena = self.arena().await?;
        Ok(found.map(|product| ProductView::build(&arena, &product)))
    }

    async fn arena(&self) -> ServiceResult<CategoryArena> {
        let rows = self.ctx.db().categories().load_all(self.ctx.db().pool()).await?;
        Ok(CategoryArena::new(rows))
    }
}

fn build(
    id: String,
    code: String,
    input: &ProductInput,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> Product {
    let status = if input.stock_managed {
        stock_status(input.status, input.stock_quantity)
    } else {
        input.status
    };
    Product {
        id,
        code,
        name: input.name.trim().to_string(),
        description: clean(&input.description),
        active: input.active,
        product_type: input.product_type,
        status,
        reference: clean(&input.reference),
        sku: clean(&input.sku),
        ean: clean(&input.ean),
        unit_price_cents: input.unit_price_cents,
        cost_price_cents: input.cost_price_cents,
        vat_rate_bps: input.vat_rate_bps,
        stock_managed: input.stock_managed,
        stock_quantity: input.stock_quantity,
        min_stock_level: input.min_stock_level,
        max_stock_level: input.max_stock_level,
        unit: input.unit.trim().to_string(),
        weight_grams: input.weight_grams,
        image_url: clean(&input.image_url),
        category_id: input.category_id.trim().to_string(),
        created_at,
        updated_at,
    }
}

/// Availability implied by a stock level. Discontinued, pending and draft
/// products keep their status.
fn stock_status(current: ProductStatus, quantity: i32) -> ProductStatus {
    match current {
        ProductStatus::Available if quantity <= 0 => ProductStatus::OutOfStock,
        ProductStatus::OutOfStock if quantity > 0 => ProductStatus::Available,
        other => other,
    }
}

/// SQLite names the column but not the value; fill it in from the row.
fn duplicate_value(err: DbError, product: &Product) -> DbError {
    let value = match &err {
        DbError::UniqueViolation { field, .. } => match field.as_str() {
            "products.sku" => product.sku.clone(),
            "products.ean" => product.ean.clone(),
            _ => Some(product.code.clone()),
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
