//! # Category Repository
//!
//! Row-level access to the category forest. Tree rules (no cycles, delete
//! guards) are enforced by the category service on top of these calls;
//! the schema's `ON DELETE RESTRICT` foreign keys are the last line.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use comptoir_core::page::{Page, PageRequest};
use comptoir_core::types::{Category, CategoryFilter};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{paginate, push_search};
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, code, name, description, parent_id, sort_order, active, \
                       image_url, icon_class, created_at, updated_at";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE id = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(category)
    }

    pub async fn find_by_code<'e>(&self, ex: impl SqliteExecutor<'e>, code: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE code = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(code)
            .fetch_optional(ex)
            .await?;
        Ok(category)
    }

    /// Every category, siblings in display order. Feeds `CategoryArena`.
    pub async fn load_all<'e>(&self, ex: impl SqliteExecutor<'e>) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories ORDER BY sort_order, name");
        let categories = sqlx::query_as::<_, Category>(&sql).fetch_all(ex).await?;
        Ok(categories)
    }

    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, category: &Category) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories
                (id, code, name, description, parent_id, sort_order, active,
                 image_url, icon_class, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&category.id)
        .bind(&category.code)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.parent_id)
        .bind(category.sort_order)
        .bind(category.active)
        .bind(&category.image_url)
        .bind(&category.icon_class)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(ex)
        .await
        .map_err(|e| DbError::from(e).with_value(&category.code))?;

        debug!(id = %category.id, code = %category.code, "Inserted category");
        Ok(())
    }

    /// Replaces every mutable column.
    pub async fn update<'e>(&self, ex: impl SqliteExecutor<'e>, category: &Category) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET
                code = ?2, name = ?3, description = ?4, parent_id = ?5, sort_order = ?6,
                active = ?7, image_url = ?8, icon_class = ?9, updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&category.id)
        .bind(&category.code)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.parent_id)
        .bind(category.sort_order)
        .bind(category.active)
        .bind(&category.image_url)
        .bind(&category.icon_class)
        .bind(category.updated_at)
        .execute(ex)
        .await
        .map_err(|e| DbError::from(e).with_value(&category.code))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", &category.id));
        }
        debug!(id = %category.id, "Updated category");
        Ok(())
    }

    /// Bumps `updated_at`. Run first in a unit of work to take the write
    /// lock before the tree is read. Returns false if the row is gone.
    pub async fn touch<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE categories SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(ex)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        debug!(id, "Deleted category");
        Ok(())
    }

    pub async fn count_children<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE parent_id = ?1")
            .bind(id)
            .fetch_one(ex)
            .await?;
        Ok(count)
    }

    pub async fn count_products<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
            .bind(id)
            .fetch_one(ex)
            .await?;
        Ok(count)
    }

    /// Products per category id, for read models. Missing ids have none.
    pub async fn product_counts(&self) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT category_id, COUNT(*) FROM products GROUP BY category_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Direct children of `parent` (roots when `None`), in display order.
    pub async fn list_children(&self, parent: Option<&str>) -> DbResult<Vec<Category>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM categories WHERE parent_id IS ?1 ORDER BY sort_order, name"
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(parent)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn list_active(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE active = 1 ORDER BY sort_order, name");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn search(&self, filter: &CategoryFilter, page: PageRequest) -> DbResult<Page<Category>> {
        paginate(&self.pool, COLUMNS, "categories", "sort_order, name", page, |qb| {
            if let Some(active) = filter.active {
                qb.push(" AND active = ");
                qb.push_bind(active);
            }
            if let Some(parent_id) = &filter.parent_id {
                qb.push(" AND parent_id = ");
                qb.push_bind(parent_id.clone());
            }
            if let Some(term) = &filter.search {
                push_search(qb, &["code", "name", "description"], term);
            }
        })
        .await
    }

    /// `(all, active, roots)`.
    pub async fn counts(&self) -> DbResult<(i64, i64, i64)> {
        let counts = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(active), 0),
                   COALESCE(SUM(parent_id IS NULL), 0)
            FROM categories
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
