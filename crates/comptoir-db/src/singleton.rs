//! # Singleton Flag Enforcer
//!
//! Keeps "at most one flagged row per scope": one primary contact per
//! customer, one default address per customer.
//!
//! ## Clear, Then Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set_flag(contact B, customer C)        (caller's transaction)          │
//! │                                                                         │
//! │  1. UPDATE contacts SET is_primary = 0                                  │
//! │       WHERE customer_id = C AND is_primary = 1 AND id <> B              │
//! │     ─ a write first: the transaction takes the write lock before it     │
//! │       reads anything, so concurrent setters serialize here              │
//! │  2. UPDATE contacts SET is_primary = 1 WHERE id = B AND customer_id = C │
//! │     ─ 0 rows → NotFound, or B belongs to another customer               │
//! │                                                                         │
//! │  Backstop: UNIQUE INDEX … ON contacts(customer_id) WHERE is_primary = 1 │
//! │  A violation maps to DbError::Conflict and the unit is replayed.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Zero flagged rows is a legal state. Deleting (or moving away) the
//! flagged row while siblings remain is refused: the caller must move the
//! flag first.

use chrono::{DateTime, Utc};
use comptoir_core::ValidationError;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Describes one "at most one flagged row per scope" rule.
///
/// All names are compile-time constants; they are spliced into SQL and
/// must never come from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagScope {
    /// Entity name for error messages (`Contact`).
    pub entity: &'static str,
    pub table: &'static str,
    pub scope_column: &'static str,
    pub flag_column: &'static str,
    /// Flag name for error messages (`primary`).
    pub flag_name: &'static str,
}

/// One primary contact per customer.
pub const CONTACT_PRIMARY: FlagScope = FlagScope {
    entity: "Contact",
    table: "contacts",
    scope_column: "customer_id",
    flag_column: "is_primary",
    flag_name: "primary",
};

/// One default address per customer.
pub const ADDRESS_DEFAULT: FlagScope = FlagScope {
    entity: "Address",
    table: "addresses",
    scope_column: "customer_id",
    flag_column: "is_default",
    flag_name: "default",
};

impl FlagScope {
    /// Makes `entity_id` the only flagged row of `scope_id`.
    ///
    /// Idempotent when the row is already flagged.
    pub async fn set_flag(
        &self,
        conn: &mut SqliteConnection,
        entity_id: &str,
        scope_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let cleared = self.clear_others(conn, scope_id, Some(entity_id), now).await?;

        let set_sql = format!(
            "UPDATE {table} SET {flag} = 1, updated_at = ?1 WHERE id = ?2 AND {scope} = ?3",
            table = self.table,
            flag = self.flag_column,
            scope = self.scope_column,
        );
        let result = sqlx::query(&set_sql)
            .bind(now)
            .bind(entity_id)
            .bind(scope_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(match self.scope_of(conn, entity_id).await? {
                None => DbError::not_found(self.entity, entity_id),
                Some(_) => ValidationError::ScopeMismatch {
                    entity: self.entity.to_string(),
                    id: entity_id.to_string(),
                    scope: scope_id.to_string(),
                }
                .into(),
            });
        }

        debug!(
            entity = self.entity,
            id = entity_id,
            scope = scope_id,
            cleared,
            "Flag {} assigned",
            self.flag_name
        );
        Ok(())
    }

    /// Clears the flag on every row of `scope_id`, ahead of inserting a new
    /// flagged row.
    pub async fn clear_for_new_flagged(
        &self,
        conn: &mut SqliteConnection,
        scope_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        self.clear_others(conn, scope_id, None, now).await
    }

    /// Rejects removing `entity_id` from its scope (delete or move) while it
    /// holds the flag and other rows remain.
    pub async fn guard_departure(&self, conn: &mut SqliteConnection, entity_id: &str) -> DbResult<()> {
        let sql = format!(
            "SELECT {scope}, {flag} FROM {table} WHERE id = ?1",
            table = self.table,
            flag = self.flag_column,
            scope = self.scope_column,
        );
        let row: Option<(String, bool)> = sqlx::query_as(&sql)
            .bind(entity_id)
            .fetch_optional(&mut *conn)
            .await?;

        let Some((scope_id, flagged)) = row else {
            return Err(DbError::not_found(self.entity, entity_id));
        };
        if !flagged {
            return Ok(());
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {scope} = ?1 AND id <> ?2",
            table = self.table,
            scope = self.scope_column,
        );
        let siblings: i64 = sqlx::query_scalar(&count_sql)
            .bind(&scope_id)
            .bind(entity_id)
            .fetch_one(&mut *conn)
            .await?;

        if siblings > 0 {
            return Err(ValidationError::FlagReassignRequired {
                entity: self.entity.to_string(),
                id: entity_id.to_string(),
                flag: self.flag_name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Id of the flagged row of `scope_id`, if any.
    pub async fn flagged_in(&self, conn: &mut SqliteConnection, scope_id: &str) -> DbResult<Option<String>> {
        let sql = format!(
            "SELECT id FROM {table} WHERE {scope} = ?1 AND {flag} = 1",
            table = self.table,
            flag = self.flag_column,
            scope = self.scope_column,
        );
        let id = sqlx::query_scalar(&sql)
            .bind(scope_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    /// Number of flagged rows in `scope_id`. Always 0 or 1.
    pub async fn count_flagged(&self, conn: &mut SqliteConnection, scope_id: &str) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {scope} = ?1 AND {flag} = 1",
            table = self.table,
            flag = self.flag_column,
            scope = self.scope_column,
        );
        let count = sqlx::query_scalar(&sql)
            .bind(scope_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn clear_others(
        &self,
        conn: &mut SqliteConnection,
        scope_id: &str,
        keep_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let sql = format!(
            "UPDATE {table} SET {flag} = 0, updated_at = ?1 \
             WHERE {scope} = ?2 AND {flag} = 1 AND (?3 IS NULL OR id <> ?3)",
            table = self.table,
            flag = self.flag_column,
            scope = self.scope_column,
        );
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(scope_id)
            .bind(keep_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn scope_of(&self, conn: &mut SqliteConnection, entity_id: &str) -> DbResult<Option<String>> {
        let sql = format!(
            "SELECT {scope} FROM {table} WHERE id = ?1",
            table = self.table,
            scope = self.scope_column,
        );
        let scope = sqlx::query_scalar(&sql)
            .bind(entity_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(scope)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
