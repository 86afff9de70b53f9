//! # Sequence Generator
//!
//! Issues human-readable business codes (`CLI-2025-0001`) from durable
//! per-(type, year) counters.
//!
//! ## One Statement Per Code
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT INTO sequences (…, current_value = 1)                           │
//! │  ON CONFLICT (sequence_type, year)                                      │
//! │      DO UPDATE SET current_value = current_value + 1                    │
//! │  RETURNING current_value, padding_length                                │
//! │                                                                         │
//! │  • first use of a (type, year) creates the row at 1                    │
//! │  • later uses increment under the SQLite write lock                    │
//! │  • no read-then-write window: two callers can never see the same value │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`SequenceGenerator::next_code_in`] runs on the caller's transaction so a
//! rolled-back entity insert also rolls back its code. Values are never
//! decremented and rows are never deleted, so a committed code is never
//! reissued, even after its owner is deleted.

use std::sync::Arc;

use comptoir_core::clock::ClockSource;
use comptoir_core::sequence::{
    format_code, validate_padding, validate_prefix, validate_sequence_type, Counter, SequenceType,
    DEFAULT_PADDING,
};
use comptoir_core::types::new_id;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::retry::{retry_transient, RetryPolicy};

/// Generator of unique, gap-tolerant, year-scoped business codes.
#[derive(Clone)]
pub struct SequenceGenerator {
    pool: SqlitePool,
    clock: Arc<dyn ClockSource>,
    /// Padding for counters created from now on; existing rows keep theirs.
    padding: u32,
    retry: RetryPolicy,
}

impl SequenceGenerator {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockSource>) -> Self {
        SequenceGenerator {
            pool,
            clock,
            padding: DEFAULT_PADDING,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Next code for `sequence_type`, as its own unit of work.
    ///
    /// Replayed on transient lock conflicts.
    pub async fn next_code(&self, sequence_type: &str, prefix: &str) -> DbResult<String> {
        let sequence_type = sequence_type.trim();
        self.validate(sequence_type, prefix)?;

        retry_transient(&self.retry, "sequence.next_code", || async {
            let mut tx = self.pool.begin().await?;
            let code = self.increment(&mut tx, sequence_type, prefix).await?;
            tx.commit().await?;
            Ok::<_, DbError>(code)
        })
        .await
    }

    /// Next code for `sequence_type` inside the caller's transaction.
    ///
    /// The increment becomes visible (and the code consumed) only when the
    /// caller commits.
    pub async fn next_code_in(
        &self,
        conn: &mut SqliteConnection,
        sequence_type: &str,
        prefix: &str,
    ) -> DbResult<String> {
        let sequence_type = sequence_type.trim();
        self.validate(sequence_type, prefix)?;
        self.increment(conn, sequence_type, prefix).await
    }

    /// [`Self::next_code_in`] for one of the well-known entity sequences.
    pub async fn next_for(&self, conn: &mut SqliteConnection, sequence: SequenceType) -> DbResult<String> {
        self.next_code_in(conn, sequence.as_str(), sequence.prefix()).await
    }

    /// Current state of a counter without consuming a value.
    pub async fn peek(&self, sequence_type: &str, year: i32) -> DbResult<Option<Counter>> {
        let counter = sqlx::query_as::<_, Counter>(
            r#"
            SELECT sequence_type, year, prefix, current_value, padding_length,
                   created_at, updated_at
            FROM sequences
            WHERE sequence_type = ?1 AND year = ?2
            "#,
        )
        .bind(sequence_type)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    /// Every counter, newest year first.
    pub async fn list(&self) -> DbResult<Vec<Counter>> {
        let counters = sqlx::query_as::<_, Counter>(
            r#"
            SELECT sequence_type, year, prefix, current_value, padding_length,
                   created_at, updated_at
            FROM sequences
            ORDER BY year DESC, sequence_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counters)
    }

    fn validate(&self, sequence_type: &str, prefix: &str) -> DbResult<()> {
        validate_sequence_type(sequence_type)?;
        validate_prefix(prefix)?;
        validate_padding(self.padding)?;
        Ok(())
    }

    async fn increment(&self, conn: &mut SqliteConnection, sequence_type: &str, prefix: &str) -> DbResult<String> {
        let year = self.clock.year();
        let now = self.clock.now();

        let (value, padding): (i64, i32) = sqlx::query_as(
            r#"
            INSERT INTO sequences
                (id, sequence_type, year, prefix, current_value, padding_length, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)
            ON CONFLICT (sequence_type, year) DO UPDATE SET
                current_value = sequences.current_value + 1,
                updated_at = excluded.updated_at
            RETURNING current_value, padding_length
            "#,
        )
        .bind(new_id())
        .bind(sequence_type)
        .bind(year)
        .bind(prefix)
        .bind(self.padding as i32)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        // The stored prefix records first use only; codes carry the caller's.
        let code = format_code(prefix, year, value, padding.max(1) as usize);
        debug!(sequence_type, year, value, code = %code, "Issued sequence code");
        Ok(code)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use comptoir_core::clock::FixedClock;
    use std::collections::HashSet;

    fn clock(year: i32) -> Arc<dyn ClockSource> {
        Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(year, 3, 14).unwrap()))
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_first_codes_of_the_year() {
        let db = db().await;
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        let mut codes = Vec::new();
        for _ in 0..5 {
            codes.push(generator.next_code("CUSTOMER", "CLI").await.unwrap());
        }

        assert_eq!(codes.first().unwrap(), "CLI-2025-0001");
        assert_eq!(codes.last().unwrap(), "CLI-2025-0005");

        let counter = generator.peek("CUSTOMER", 2025).await.unwrap().unwrap();
        assert_eq!(counter.current_value, 5);
        assert_eq!(counter.current_code(), "CLI-2025-0005");
    }

    #[tokio::test]
    async fn test_types_and_years_are_independent() {
        let db = db().await;
        let y2025 = SequenceGenerator::new(db.pool().clone(), clock(2025));
        let y2026 = SequenceGenerator::new(db.pool().clone(), clock(2026));

        assert_eq!(y2025.next_code("CUSTOMER", "CLI").await.unwrap(), "CLI-2025-0001");
        assert_eq!(y2025.next_code("CUSTOMER", "CLI").await.unwrap(), "CLI-2025-0002");
        assert_eq!(y2025.next_code("PRODUCT", "PRD").await.unwrap(), "PRD-2025-0001");
        assert_eq!(y2026.next_code("CUSTOMER", "CLI").await.unwrap(), "CLI-2026-0001");

        assert_eq!(y2025.list().await.unwrap().len(), 3);
        assert!(y2025.peek("CONTACT", 2025).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_code_uses_the_requested_prefix() {
        let db = db().await;
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        assert_eq!(generator.next_code("CUSTOMER", "CLI").await.unwrap(), "CLI-2025-0001");
        assert_eq!(generator.next_code("CUSTOMER", "CUS").await.unwrap(), "CUS-2025-0002");

        // One counter per type: the prefix does not split it.
        let counter = generator.peek("CUSTOMER", 2025).await.unwrap().unwrap();
        assert_eq!(counter.current_value, 2);
        assert_eq!(counter.prefix, "CLI");
    }

    #[tokio::test]
    async fn test_free_form_type_names_are_trimmed() {
        let db = db().await;
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        assert_eq!(generator.next_code("supplier invoice", "FAF").await.unwrap(), "FAF-2025-0001");
        assert_eq!(generator.next_code("  supplier invoice ", "FAF").await.unwrap(), "FAF-2025-0002");
        assert_eq!(generator.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_padding_is_fixed_at_creation_and_overflows_wide() {
        let db = db().await;
        let narrow = SequenceGenerator::new(db.pool().clone(), clock(2025)).with_padding(1);
        let wide = SequenceGenerator::new(db.pool().clone(), clock(2025)).with_padding(6);

        for expected in 1..=9 {
            assert_eq!(narrow.next_code("TICKET", "T").await.unwrap(), format!("T-2025-{expected}"));
        }
        // Row already exists with padding 1: the wider setting does not apply.
        assert_eq!(wide.next_code("TICKET", "T").await.unwrap(), "T-2025-10");
    }

    #[tokio::test]
    async fn test_rolled_back_increment_is_not_consumed() {
        let db = db().await;
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        let mut tx = db.pool().begin().await.unwrap();
        let code = generator.next_for(&mut tx, SequenceType::Contact).await.unwrap();
        assert_eq!(code, "CNT-2025-0001");
        tx.rollback().await.unwrap();

        assert_eq!(generator.next_code("CONTACT", "CNT").await.unwrap(), "CNT-2025-0001");
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let db = db().await;
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        assert!(matches!(
            generator.next_code("   ", "CLI").await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            generator.next_code("CUSTOMER", "").await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            generator.clone().with_padding(0).next_code("CUSTOMER", "CLI").await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_distinct_codes() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("seq.db")).max_connections(5))
            .await
            .unwrap();
        let generator = SequenceGenerator::new(db.pool().clone(), clock(2025));

        let mut handles = Vec::new();
        for _ in 0..40 {
            let generator = generator.clone();
            handles.push(tokio::spawn(async move {
                generator.next_code("CUSTOMER", "CLI").await
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            codes.insert(handle.await.unwrap().unwrap());
        }

        assert_eq!(codes.len(), 40);
        assert!(codes.contains("CLI-2025-0001"));
        assert!(codes.contains("CLI-2025-0040"));
        let counter = generator.peek("CUSTOMER", 2025).await.unwrap().unwrap();
        assert_eq!(counter.current_value, 40);
        db.close().await;
    }
}
