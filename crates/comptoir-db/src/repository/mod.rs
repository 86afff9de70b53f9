//! # Repository Module
//!
//! Database repository implementations for Comptoir.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Domain service (one unit of work)                                     │
//! │       │                                                                 │
//! │       │  let mut tx = db.pool().begin().await?;                        │
//! │       │  db.customers().insert(&mut *tx, &customer).await?;            │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  CustomerRepository                                                    │
//! │  ├── single-row ops take any executor: pool or transaction             │
//! │  └── listings and searches read straight from the pool                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`](category::CategoryRepository) - Category rows and tree loading
//! - [`ProductRepository`](product::ProductRepository) - Catalog, stock, search
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and search
//! - [`AddressRepository`](address::AddressRepository) - Customer addresses
//! - [`ContactRepository`](contact::ContactRepository) - CRM contacts and follow-ups
//! - [`UserRepository`](user::UserRepository) - Users, roles, permissions

use comptoir_core::page::{Page, PageRequest};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::DbResult;

pub mod address;
pub mod category;
pub mod contact;
pub mod customer;
pub mod product;
pub mod user;

/// `%term%`, lower-cased, for `lower(col) LIKE ?` matching.
pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim().to_lowercase())
}

/// Appends `AND (lower(a) LIKE ? OR lower(b) LIKE ? ...)`.
pub(crate) fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, columns: &[&str], term: &str) {
    let pattern = like_pattern(term);
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("lower(coalesce({column}, '')) LIKE "));
        qb.push_bind(pattern.clone());
    }
    qb.push(")");
}

/// Runs a filtered COUNT and the matching page with the same predicates.
///
/// `filter` appends ` AND …` clauses after `WHERE 1=1`; it is called once
/// per query so both see identical binds.
pub(crate) async fn paginate<T, F>(
    pool: &SqlitePool,
    columns: &str,
    table: &str,
    order_by: &str,
    request: PageRequest,
    filter: F,
) -> DbResult<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    F: Fn(&mut QueryBuilder<'_, Sqlite>),
{
    let mut count_query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} WHERE 1=1"));
    filter(&mut count_query);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut page_query = QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE 1=1"));
    filter(&mut page_query);
    page_query.push(format!(" ORDER BY {order_by} LIMIT "));
    page_query.push_bind(request.limit());
    page_query.push(" OFFSET ");
    page_query.push_bind(request.offset());

    let items = page_query.build_query_as::<T>().fetch_all(pool).await?;
    Ok(Page::new(items, request, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("  Acme "), "%acme%");
    }

    #[test]
    fn test_push_search_sql() {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT 1 WHERE 1=1");
        push_search(&mut qb, &["code", "name"], "x");
        assert_eq!(
            qb.sql(),
            "SELECT 1 WHERE 1=1 AND (lower(coalesce(code, '')) LIKE ? OR lower(coalesce(name, '')) LIKE ?)"
        );
    }
}
