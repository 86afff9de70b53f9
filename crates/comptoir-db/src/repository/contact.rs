//! # Contact Repository
//!
//! CRM contacts and their follow-up dates. `is_primary` is never written
//! here: [`crate::singleton::CONTACT_PRIMARY`] owns that column.

use chrono::{DateTime, Utc};
use comptoir_core::page::{Page, PageRequest};
use comptoir_core::types::{Contact, ContactFilter, ContactStatus};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{paginate, push_search};
use crate::error::{DbError, DbResult};

const COLUMNS: &str = "id, code, contact_type, status, civility, first_name, last_name, job_title, \
                       department, email, phone, mobile, address_line1, address_line2, postal_code, \
                       city, country, birth_date, notes, email_opt_in, sms_opt_in, preferred_contact, \
                       preferred_language, priority, customer_id, is_primary, is_decision_maker, \
                       last_contact_at, next_contact_at, last_contact_note, created_at, updated_at";

/// Primary first, then by name.
const BY_CUSTOMER_ORDER: &str = "is_primary DESC, last_name, first_name";

#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ContactRepository { pool }
    }

    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<Contact>> {
        let sql = format!("SELECT {COLUMNS} FROM contacts WHERE id = ?1");
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(contact)
    }

    pub async fn find_by_code<'e>(&self, ex: impl SqliteExecutor<'e>, code: &str) -> DbResult<Option<Contact>> {
        let sql = format!("SELECT {COLUMNS} FROM contacts WHERE code = ?1");
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(code)
            .fetch_optional(ex)
            .await?;
        Ok(contact)
    }

    pub async fn find_primary<'e>(&self, ex: impl SqliteExecutor<'e>, customer_id: &str) -> DbResult<Option<Contact>> {
        let sql = format!("SELECT {COLUMNS} FROM contacts WHERE customer_id = ?1 AND is_primary = 1");
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(customer_id)
            .fetch_optional(ex)
            .await?;
        Ok(contact)
    }

    pub async fn list_by_customer<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        customer_id: &str,
    ) -> DbResult<Vec<Contact>> {
        let sql = format!("SELECT {COLUMNS} FROM contacts WHERE customer_id = ?1 ORDER BY {BY_CUSTOMER_ORDER}");
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(customer_id)
            .fetch_all(ex)
            .await?;
        Ok(contacts)
    }

    /// Inserts with `is_primary` as given; the caller clears the scope first.
    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, contact: &Contact) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, code, contact_type, status, civility, first_name, last_name, job_title,
                department, email, phone, mobile, address_line1, address_line2, postal_code,
                city, country, birth_date, notes, email_opt_in, sms_opt_in, preferred_contact,
                preferred_language, priority, customer_id, is_primary, is_decision_maker,
                last_contact_at, next_contact_at, last_contact_note, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                      ?31, ?32)
            "#,
        )
        .bind(&contact.id)
        .bind(&contact.code)
        .bind(contact.contact_type)
        .bind(contact.status)
        .bind(contact.civility)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.job_title)
        .bind(&contact.department)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.mobile)
        .bind(&contact.address_line1)
        .bind(&contact.address_line2)
        .bind(&contact.postal_code)
        .bind(&contact.city)
        .bind(&contact.country)
        .bind(contact.birth_date)
        .bind(&contact.notes)
        .bind(contact.email_opt_in)
        .bind(contact.sms_opt_in)
        .bind(contact.preferred_contact)
        .bind(contact.preferred_language)
        .bind(contact.priority)
        .bind(&contact.customer_id)
        .bind(contact.is_primary)
        .bind(contact.is_decision_maker)
        .bind(contact.last_contact_at)
        .bind(contact.next_contact_at)
        .bind(&contact.last_contact_note)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .execute(ex)
        .await?;

        debug!(id = %contact.id, code = %contact.code, customer_id = %contact.customer_id, "Inserted contact");
        Ok(())
    }

    /// Replaces every column except `is_primary`.
    pub async fn update<'e>(&self, ex: impl SqliteExecutor<'e>, contact: &Contact) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE contacts SET
                code = ?2, contact_type = ?3, status = ?4, civility = ?5, first_name = ?6,
                last_name = ?7, job_title = ?8, department = ?9, email = ?10, phone = ?11,
                mobile = ?12, address_line1 = ?13, address_line2 = ?14, postal_code = ?15,
                city = ?16, country = ?17, birth_date = ?18, notes = ?19, email_opt_in = ?20,
                sms_opt_in = ?21, preferred_contact = ?22, preferred_language = ?23,
                priority = ?24, customer_id = ?25, is_decision_maker = ?26,
                last_contact_at = ?27, next_contact_at = ?28, last_contact_note = ?29,
                updated_at = ?30
            WHERE id = ?1
            "#,
        )
        .bind(&contact.id)
        .bind(&contact.code)
        .bind(contact.contact_type)
        .bind(contact.status)
        .bind(contact.civility)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.job_title)
        .bind(&contact.department)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.mobile)
        .bind(&contact.address_line1)
        .bind(&contact.address_line2)
        .bind(&contact.postal_code)
        .bind(&contact.city)
        .bind(&contact.country)
        .bind(contact.birth_date)
        .bind(&contact.notes)
        .bind(contact.email_opt_in)
        .bind(contact.sms_opt_in)
        .bind(contact.preferred_contact)
        .bind(contact.preferred_language)
        .bind(contact.priority)
        .bind(&contact.customer_id)
        .bind(contact.is_decision_maker)
        .bind(contact.last_contact_at)
        .bind(contact.next_contact_at)
        .bind(&contact.last_contact_note)
        .bind(contact.updated_at)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", &contact.id));
        }
        debug!(id = %contact.id, "Updated contact");
        Ok(())
    }

    /// Unsets the primary flag of one contact.
    pub async fn clear_primary<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE contacts SET is_primary = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(ex)
            .await?;
        Ok(())
    }

    /// Stores an interaction: last contact date and note.
    pub async fn record_interaction<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        id: &str,
        at: DateTime<Utc>,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE contacts SET last_contact_at = ?2, last_contact_note = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(at)
        .bind(note)
        .bind(now)
        .execute(ex)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", id));
        }
        Ok(())
    }

    pub async fn schedule_next<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        id: &str,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE contacts SET next_contact_at = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .bind(now)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", id));
        }
        Ok(())
    }

    pub async fn delete<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact", id));
        }
        debug!(id, "Deleted contact");
        Ok(())
    }

    pub async fn search(&self, filter: &ContactFilter, page: PageRequest) -> DbResult<Page<Contact>> {
        paginate(&self.pool, COLUMNS, "contacts", "last_name, first_name, code", page, |qb| {
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
            if let Some(contact_type) = filter.contact_type {
                qb.push(" AND contact_type = ");
                qb.push_bind(contact_type);
            }
            if let Some(customer_id) = &filter.customer_id {
                qb.push(" AND customer_id = ");
                qb.push_bind(customer_id.clone());
            }
            if let Some(priority) = filter.priority {
                qb.push(" AND priority = ");
                qb.push_bind(priority);
            }
            if let Some(is_primary) = filter.is_primary {
                qb.push(" AND is_primary = ");
                qb.push_bind(is_primary);
            }
            if let Some(term) = &filter.search {
                push_search(qb, &["code", "first_name", "last_name", "email", "job_title"], term);
            }
        })
        .await
    }

    /// Active contacts whose next follow-up is at or before `now`.
    pub async fn due_for_follow_up(&self, now: DateTime<Utc>) -> DbResult<Vec<Contact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM contacts \
             WHERE status = ?1 AND next_contact_at IS NOT NULL AND next_contact_at <= ?2 \
             ORDER BY next_contact_at"
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(ContactStatus::Active)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    /// Active contacts not reached since `cutoff` (or never).
    pub async fn stale(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Contact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM contacts \
             WHERE status = ?1 AND (last_contact_at IS NULL OR last_contact_at < ?2) \
             ORDER BY last_contact_at, last_name, first_name"
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(ContactStatus::Active)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    /// Decision makers, optionally for one customer.
    pub async fn decision_makers(&self, customer_id: Option<&str>) -> DbResult<Vec<Contact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM contacts \
             WHERE is_decision_maker = 1 AND (?1 IS NULL OR customer_id = ?1) \
             ORDER BY {BY_CUSTOMER_ORDER}"
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    /// Contacts born in `month` (1-12), by day of month.
    pub async fn birthdays_in_month(&self, month: u32) -> DbResult<Vec<Contact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM contacts \
             WHERE birth_date IS NOT NULL AND strftime('%m', birth_date) = ?1 \
             ORDER BY strftime('%d', birth_date), last_name, first_name"
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(format!("{month:02}"))
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    pub async fn count_by_customer<'e>(&self, ex: impl SqliteExecutor<'e>, customer_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE customer_id = ?1")
            .bind(customer_id)
            .fetch_one(ex)
            .await?;
        Ok(count)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_by_status(&self, status: ContactStatus) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, NaiveDate};
    use comptoir_core::types::{ContactPriority, ContactType, PreferredContact, PreferredLanguage};

    fn contact(id: &str, last_name: &str, is_primary: bool) -> Contact {
        let now = Utc::now();
        Contact {
            id: id.to_string(),
            code: format!("CNT-{id}"),
            contact_type: ContactType::Contact,
            status: ContactStatus::Active,
            civility: None,
            first_name: "Anne".to_string(),
            last_name: Some(last_name.to_string()),
            job_title: None,
            department: None,
            email: None,
            phone: None,
            mobile: None,
            address_line1: None,
            address_line2: None,
            postal_code: None,
            city: None,
            country: None,
            birth_date: None,
            notes: None,
            email_opt_in: true,
            sms_opt_in: true,
            preferred_contact: PreferredContact::Email,
            preferred_language: PreferredLanguage::French,
            priority: ContactPriority::Normal,
            customer_id: "c1".to_string(),
            is_primary,
            is_decision_maker: false,
            last_contact_at: None,
            next_contact_at: None,
            last_contact_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO customers (id, code, company_name, created_at, updated_at) \
             VALUES ('c1', 'CLI-1', 'Acme', ?1, ?1)",
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_primary_first_ordering() {
        let db = setup().await;
        let repo = db.contacts();
        repo.insert(db.pool(), &contact("k1", "Bernard", false)).await.unwrap();
        repo.insert(db.pool(), &contact("k2", "Zola", true)).await.unwrap();
        repo.insert(db.pool(), &contact("k3", "Albert", false)).await.unwrap();

        let ids: Vec<String> = repo
            .list_by_customer(db.pool(), "c1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["k2", "k3", "k1"]);
        assert_eq!(repo.find_primary(db.pool(), "c1").await.unwrap().unwrap().id, "k2");
        assert_eq!(repo.count_by_customer(db.pool(), "c1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_follow_up_queries() {
        let db = setup().await;
        let repo = db.contacts();
        let now = Utc::now();

        let mut due = contact("due", "A", false);
        due.next_contact_at = Some(now - Duration::days(1));
        due.last_contact_at = Some(now - Duration::days(100));
        let mut later = contact("later", "B", false);
        later.next_contact_at = Some(now + Duration::days(7));
        later.last_contact_at = Some(now - Duration::days(2));
        later.birth_date = NaiveDate::from_ymd_opt(1980, 7, 14);
        later.is_decision_maker = true;
        for c in [&due, &later] {
            repo.insert(db.pool(), c).await.unwrap();
        }

        let ids: Vec<String> = repo.due_for_follow_up(now).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["due"]);

        let stale: Vec<String> = repo
            .stale(now - Duration::days(30))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(stale, vec!["due"]);

        assert_eq!(repo.birthdays_in_month(7).await.unwrap().len(), 1);
        assert!(repo.birthdays_in_month(8).await.unwrap().is_empty());
        assert_eq!(repo.decision_makers(Some("c1")).await.unwrap().len(), 1);
        assert_eq!(repo.decision_makers(None).await.unwrap().len(), 1);

        repo.record_interaction(db.pool(), "due", now, Some("Called"), now)
            .await
            .unwrap();
        let refreshed = repo.get(db.pool(), "due").await.unwrap().unwrap();
        assert_eq!(refreshed.last_contact_note.as_deref(), Some("Called"));
    }
}
