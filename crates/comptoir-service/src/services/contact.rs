//! # Contact Service
//!
//! CRM contacts of a customer, their primary flag and follow-up dates.
//!
//! ## Primary Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(primary)         clear_for_new_flagged(customer) ─► INSERT      │
//! │  set_primary(k, c)       set_flag: clear others of c ─► set k           │
//! │  update, same customer   false→true set_flag │ true→false clear_primary │
//! │  update, new customer    guard_departure ─► clear ─► UPDATE ─► set_flag │
//! │  delete                  guard_departure ─► DELETE                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use comptoir_core::validation::{non_blank, validate_contact_input, validate_search_query};
use comptoir_core::{
    new_id, Contact, ContactFilter, ContactInput, ContactStatus, ContactView, Page, PageRequest,
    SequenceType, ValidationError,
};
use comptoir_db::{DbError, CONTACT_PRIMARY};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::clean;

const MAX_NOTE_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContactCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub blocked: i64,
    pub archived: i64,
    pub bounced: i64,
}

#[derive(Clone)]
pub struct ContactService {
    ctx: ServiceContext,
}

impl ContactService {
    pub fn new(ctx: ServiceContext) -> Self {
        ContactService { ctx }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a contact. A primary contact takes the flag from the
    /// customer's current one.
    pub async fn create(&self, input: ContactInput) -> ServiceResult<Contact> {
        validate_contact_input(&input)?;
        let contact = self.ctx.run("contact.create", || self.create_once(&input)).await?;
        info!(
            id = %contact.id,
            code = %contact.code,
            customer_id = %contact.customer_id,
            primary = contact.is_primary,
            "Contact created"
        );
        Ok(contact)
    }

    async fn create_once(&self, input: &ContactInput) -> ServiceResult<Contact> {
        let now = self.ctx.now();
        let customer_id = input.customer_id.trim();
        let mut tx = self.ctx.db().pool().begin().await?;

        if input.is_primary {
            CONTACT_PRIMARY.clear_for_new_flagged(&mut tx, customer_id, now).await?;
        }
        self.require_customer(&mut tx, customer_id).await?;

        let code = match non_blank(input.code.as_deref()) {
            Some(code) => code.to_string(),
            None => self.ctx.sequences().next_for(&mut tx, SequenceType::Contact).await?,
        };
        let contact = build(new_id(), code, input, None, now, now);
        self.ctx
            .db()
            .contacts()
            .insert(&mut *tx, &contact)
            .await
            .map_err(|e| duplicate_value(e, &contact))?;
        tx.commit().await?;
        Ok(contact)
    }

    /// Replaces the contact fields, moving the primary flag as requested.
    ///
    /// Moving the primary contact to another customer is refused while its
    /// current customer has other contacts.
    pub async fn update(&self, id: &str, input: ContactInput) -> ServiceResult<Contact> {
        validate_contact_input(&input)?;
        let contact = self.ctx.run("contact.update", || self.update_once(id, &input)).await?;
        info!(id, code = %contact.code, "Contact updated");
        Ok(contact)
    }

    async fn update_once(&self, id: &str, input: &ContactInput) -> ServiceResult<Contact> {
        let repo = self.ctx.db().contacts();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let current = repo
            .get(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Contact", id))?;
        let customer_id = input.customer_id.trim();
        let moving = customer_id != current.customer_id;

        if moving {
            self.require_customer(&mut tx, customer_id).await?;
            CONTACT_PRIMARY.guard_departure(&mut tx, id).await?;
            if current.is_primary {
                repo.clear_primary(&mut *tx, id, now).await?;
            }
        } else if current.is_primary && !input.is_primary {
            repo.clear_primary(&mut *tx, id, now).await?;
        }

        let code = non_blank(input.code.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| current.code.clone());
        let mut contact = build(
            current.id,
            code,
            input,
            current.last_contact_note,
            current.created_at,
            now,
        );
        repo.update(&mut *tx, &contact)
            .await
            .map_err(|e| duplicate_value(e, &contact))?;

        let keeps_flag = current.is_primary && !moving;
        if input.is_primary && !keeps_flag {
            CONTACT_PRIMARY.set_flag(&mut tx, id, customer_id, now).await?;
        }
        contact.is_primary = input.is_primary;

        tx.commit().await?;
        Ok(contact)
    }

    /// Refused for the primary contact while its customer has others.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.ctx
            .run("contact.delete", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                CONTACT_PRIMARY.guard_departure(&mut tx, id).await?;
                self.ctx.db().contacts().delete(&mut *tx, id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id, "Contact deleted");
        Ok(())
    }

    /// Makes `contact_id` the only primary contact of `customer_id`.
    pub async fn set_primary(&self, contact_id: &str, customer_id: &str) -> ServiceResult<()> {
        self.ctx
            .run("contact.set_primary", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                CONTACT_PRIMARY
                    .set_flag(&mut tx, contact_id, customer_id, self.ctx.now())
                    .await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id = contact_id, customer_id, "Primary contact set");
        Ok(())
    }

    /// Stores an interaction. A follow-up scheduled at or before it is
    /// considered done and cleared.
    pub async fn record_interaction(
        &self,
        id: &str,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> ServiceResult<Contact> {
        let note = clean(&note);
        if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(ValidationError::TooLong {
                field: "last_contact_note".to_string(),
                max: MAX_NOTE_LEN,
            }
            .into());
        }
        let contact = self
            .ctx
            .run("contact.record_interaction", || {
                self.record_interaction_once(id, at, note.as_deref())
            })
            .await?;
        info!(id, at = %at, "Interaction recorded");
        Ok(contact)
    }

    async fn record_interaction_once(
        &self,
        id: &str,
        at: DateTime<Utc>,
        note: Option<&str>,
    ) -> ServiceResult<Contact> {
        let repo = self.ctx.db().contacts();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        repo.record_interaction(&mut *tx, id, at, note, now).await?;
        let mut contact = repo
            .get(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Contact", id))?;
        if contact.next_contact_at.is_some_and(|next| next <= at) {
            repo.schedule_next(&mut *tx, id, None, now).await?;
            contact.next_contact_at = None;
        }

        tx.commit().await?;
        Ok(contact)
    }

    /// Sets (or clears with `None`) the next follow-up date, which cannot
    /// precede the last interaction.
    pub async fn schedule_next_contact(&self, id: &str, at: Option<DateTime<Utc>>) -> ServiceResult<Contact> {
        let contact = self
            .ctx
            .run("contact.schedule_next_contact", || async {
                let repo = self.ctx.db().contacts();
                let now = self.ctx.now();
                let mut tx = self.ctx.db().pool().begin().await?;

                repo.schedule_next(&mut *tx, id, at, now).await?;
                let mut contact = repo
                    .get(&mut *tx, id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Contact", id))?;
                if let (Some(next), Some(last)) = (at, contact.last_contact_at) {
                    if next < last {
                        return Err(ValidationError::BusinessRule(
                            "next contact date cannot be before the last contact date".to_string(),
                        )
                        .into());
                    }
                }
                contact.next_contact_at = at;
                contact.updated_at = now;

                tx.commit().await?;
                Ok(contact)
            })
            .await?;
        info!(id, next = ?at, "Follow-up scheduled");
        Ok(contact)
    }

    async fn require_customer(&self, conn: &mut SqliteConnection, customer_id: &str) -> ServiceResult<()> {
        if !self.ctx.db().customers().exists(&mut *conn, customer_id).await? {
            return Err(ValidationError::missing("Customer", "customer_id", customer_id).into());
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> ServiceResult<Contact> {
        self.ctx
            .db()
            .contacts()
            .get(self.ctx.db().pool(), id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Contact", id))
    }

    pub async fn find_by_code(&self, code: &str) -> ServiceResult<Contact> {
        self.ctx
            .db()
            .contacts()
            .find_by_code(self.ctx.db().pool(), code.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Contact", code))
    }

    /// Contacts of a customer, primary first, then by last and first name.
    pub async fn list_by_customer(&self, customer_id: &str) -> ServiceResult<Vec<Contact>> {
        Ok(self
            .ctx
            .db()
            .contacts()
            .list_by_customer(self.ctx.db().pool(), customer_id)
            .await?)
    }

    pub async fn find_primary(&self, customer_id: &str) -> ServiceResult<Option<Contact>> {
        Ok(self
            .ctx
            .db()
            .contacts()
            .find_primary(self.ctx.db().pool(), customer_id)
            .await?)
    }

    pub async fn search(&self, filter: ContactFilter, page: PageRequest) -> ServiceResult<Page<Contact>> {
        let filter = ContactFilter {
            search: validate_search_query(filter.search.as_deref())?,
            customer_id: clean(&filter.customer_id),
            ..filter
        };
        Ok(self.ctx.db().contacts().search(&filter, page).await?)
    }

    /// Active contacts whose follow-up date has come.
    pub async fn due_for_follow_up(&self) -> ServiceResult<Vec<Contact>> {
        Ok(self.ctx.db().contacts().due_for_follow_up(self.ctx.now()).await?)
    }

    /// Active contacts not reached within the last `days` days.
    pub async fn stale(&self, days: u32) -> ServiceResult<Vec<Contact>> {
        let cutoff = self.ctx.now() - Duration::days(i64::from(days));
        Ok(self.ctx.db().contacts().stale(cutoff).await?)
    }

    pub async fn decision_makers(&self, customer_id: Option<&str>) -> ServiceResult<Vec<Contact>> {
        Ok(self.ctx.db().contacts().decision_makers(customer_id).await?)
    }

    pub async fn birthdays_in_month(&self, month: u32) -> ServiceResult<Vec<Contact>> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            }
            .into());
        }
        Ok(self.ctx.db().contacts().birthdays_in_month(month).await?)
    }

    pub async fn counts(&self) -> ServiceResult<ContactCounts> {
        let repo = self.ctx.db().contacts();
        Ok(ContactCounts {
            total: repo.count().await?,
            active: repo.count_by_status(ContactStatus::Active).await?,
            inactive: repo.count_by_status(ContactStatus::Inactive).await?,
            blocked: repo.count_by_status(ContactStatus::Blocked).await?,
            archived: repo.count_by_status(ContactStatus::Archived).await?,
            bounced: repo.count_by_status(ContactStatus::Bounced).await?,
        })
    }

    pub async fn view(&self, id: &str) -> ServiceResult<ContactView> {
        let contact = self.get(id).await?;
        let customer = self
            .ctx
            .db()
            .customers()
            .get(self.ctx.db().pool(), &contact.customer_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", &contact.customer_id))?;
        Ok(ContactView::build(&contact, &customer, self.ctx.now()))
    }
}

fn build(
    id: String,
    code: String,
    input: &ContactInput,
    last_contact_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Contact {
    Contact {
        id,
        code,
        contact_type: input.contact_type,
        status: input.status,
        civility: input.civility,
        first_name: input.first_name.trim().to_string(),
        last_name: clean(&input.last_name),
        job_title: clean(&input.job_title),
        department: clean(&input.department),
        email: clean(&input.email).map(|e| e.to_lowercase()),
        phone: clean(&input.phone),
        mobile: clean(&input.mobile),
        address_line1: clean(&input.address_line1),
        address_line2: clean(&input.address_line2),
        postal_code: clean(&input.postal_code),
        city: clean(&input.city),
        country: clean(&input.country),
        birth_date: input.birth_date,
        notes: clean(&input.notes),
        email_opt_in: input.email_opt_in,
        sms_opt_in: input.sms_opt_in,
        preferred_contact: input.preferred_contact,
        preferred_language: input.preferred_language,
        priority: input.priority,
        customer_id: input.customer_id.trim().to_string(),
        is_primary: input.is_primary,
        is_decision_maker: input.is_decision_maker,
        last_contact_at: input.last_contact_at,
        next_contact_at: input.next_contact_at,
        last_contact_note,
        created_at,
        updated_at,
    }
}

fn duplicate_value(err: DbError, contact: &Contact) -> DbError {
    let value = match &err {
        DbError::UniqueViolation { field, .. } if field == "contacts.email" => contact.email.clone(),
        DbError::UniqueViolation { .. } => Some(contact.code.clone()),
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
    use crate::services::CustomerService;
    use chrono::{NaiveDate, TimeZone};
    use comptoir_core::{ContactType, CustomerInput, FixedClock};
    use comptoir_db::{Database, DbConfig, RetryPolicy};
    use std::sync::Arc;

    async fn setup() -> (ContactService, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        let ctx = ServiceContext::new(db).with_clock(Arc::new(clock));
        let customers = CustomerService::new(ctx.clone());
        let acme = customers.create(CustomerInput::new("Acme")).await.unwrap();
        let globex = customers.create(CustomerInput::new("Globex")).await.unwrap();
        (ContactService::new(ctx), acme.id, globex.id)
    }

    fn named(customer_id: &str, first: &str, last: &str) -> ContactInput {
        ContactInput {
            last_name: Some(last.to_string()),
            ..ContactInput::new(customer_id, first)
        }
    }

    async fn primaries(service: &ContactService, customer_id: &str) -> Vec<String> {
        service
            .list_by_customer(customer_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.is_primary)
            .map(|c| c.id)
            .collect()
    }

    #[tokio::test]
    async fn test_second_primary_on_create_takes_the_flag() {
        let (service, acme, _) = setup().await;
        let first = service.create(named(&acme, "Jean", "Dupont").primary()).await.unwrap();
        assert_eq!(first.code, "CNT-2025-0001");
        let second = service.create(named(&acme, "Marie", "Curie").primary()).await.unwrap();

        assert_eq!(primaries(&service, &acme).await, vec![second.id.clone()]);
        assert_eq!(service.find_primary(&acme).await.unwrap().unwrap().id, second.id);

        let listed: Vec<String> = service
            .list_by_customer(&acme)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.first_name)
            .collect();
        assert_eq!(listed, vec!["Marie", "Jean"]);
    }

    #[tokio::test]
    async fn test_set_primary_swaps_and_checks_scope() {
        let (service, acme, globex) = setup().await;
        let a = service.create(named(&acme, "Jean", "Dupont").primary()).await.unwrap();
        let b = service.create(named(&acme, "Marie", "Curie")).await.unwrap();

        service.set_primary(&b.id, &acme).await.unwrap();
        assert_eq!(primaries(&service, &acme).await, vec![b.id.clone()]);

        service.set_primary(&b.id, &acme).await.unwrap();
        assert_eq!(primaries(&service, &acme).await, vec![b.id.clone()]);

        let err = service.set_primary(&a.id, &globex).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::ScopeMismatch { .. })
        ));
        let err = service.set_primary("ghost", &acme).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        // Failed calls rolled back their clear.
        assert_eq!(primaries(&service, &acme).await, vec![b.id]);
    }

    #[tokio::test]
    async fn test_primary_cannot_leave_while_siblings_remain() {
        let (service, acme, globex) = setup().await;
        let main = service.create(named(&acme, "Jean", "Dupont").primary()).await.unwrap();
        let other = service.create(named(&acme, "Marie", "Curie")).await.unwrap();

        let err = service.delete(&main.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::FlagReassignRequired { .. })
        ));

        let moved = ContactInput {
            is_primary: true,
            ..named(&globex, "Jean", "Dupont")
        };
        let err = service.update(&main.id, moved.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::FlagReassignRequired { .. })
        ));

        // A non-primary contact moves freely and can take the flag over there.
        let updated = service
            .update(&other.id, ContactInput { first_name: "Marie".into(), ..moved })
            .await
            .unwrap();
        assert!(updated.is_primary);
        assert_eq!(primaries(&service, &globex).await, vec![other.id.clone()]);

        // Last contact of its customer: primary may go.
        service.delete(&main.id).await.unwrap();
        assert!(primaries(&service, &acme).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_toggles_flag_and_keeps_code() {
        let (service, acme, _) = setup().await;
        let a = service.create(named(&acme, "Jean", "Dupont").primary()).await.unwrap();
        let b = service.create(named(&acme, "Marie", "Curie")).await.unwrap();

        let promoted = service.update(&b.id, named(&acme, "Marie", "Curie").primary()).await.unwrap();
        assert_eq!(promoted.code, b.code);
        assert_eq!(primaries(&service, &acme).await, vec![b.id.clone()]);

        service.update(&b.id, named(&acme, "Marie", "Curie")).await.unwrap();
        assert!(primaries(&service, &acme).await.is_empty());
        assert!(!service.get(&a.id).await.unwrap().is_primary);
    }

    #[tokio::test]
    async fn test_business_rules_and_duplicates() {
        let (service, acme, _) = setup().await;
        let lead = ContactInput {
            contact_type: ContactType::Lead,
            ..ContactInput::new(&acme, "Paul")
        };
        assert_eq!(
            service.create(lead).await.unwrap_err().code(),
            ErrorCode::ValidationError
        );

        let with_email = ContactInput {
            email: Some("jean@acme.fr".to_string()),
            ..ContactInput::new(&acme, "Jean")
        };
        service.create(with_email.clone()).await.unwrap();
        let err = service.create(with_email).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::Duplicate { .. })
        ));

        let err = service.create(ContactInput::new("ghost", "Nobody")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingRelation { .. })
        ));
    }

    #[tokio::test]
    async fn test_follow_up_lifecycle() {
        let (service, acme, _) = setup().await;
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let contact = service
            .create(ContactInput {
                birth_date: NaiveDate::from_ymd_opt(1980, 6, 21),
                ..named(&acme, "Jean", "Dupont")
            })
            .await
            .unwrap();

        assert_eq!(service.stale(30).await.unwrap().len(), 1);

        let met = now - Duration::days(2);
        service
            .record_interaction(&contact.id, met, Some("  Salon  ".to_string()))
            .await
            .unwrap();
        assert!(service.stale(30).await.unwrap().is_empty());

        let err = service
            .schedule_next_contact(&contact.id, Some(met - Duration::days(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        service
            .schedule_next_contact(&contact.id, Some(now - Duration::days(1)))
            .await
            .unwrap();
        let due = service.due_for_follow_up().await.unwrap();
        assert_eq!(due.len(), 1);

        let view = service.view(&contact.id).await.unwrap();
        assert!(view.overdue);
        assert_eq!(view.days_since_last_contact, Some(2));
        assert_eq!(view.customer_name, "Acme");

        let done = service.record_interaction(&contact.id, now, None).await.unwrap();
        assert_eq!(done.next_contact_at, None);
        assert!(service.due_for_follow_up().await.unwrap().is_empty());

        assert_eq!(service.birthdays_in_month(6).await.unwrap().len(), 1);
        assert!(service.birthdays_in_month(7).await.unwrap().is_empty());
        assert!(service.birthdays_in_month(13).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_primary_changes_leave_one_primary() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("contacts.db")).max_connections(4))
            .await
            .unwrap();
        let ctx = ServiceContext::new(db.clone())
            .with_retry(RetryPolicy::new(20, std::time::Duration::from_millis(5)));
        let customer = CustomerService::new(ctx.clone())
            .create(CustomerInput::new("Acme"))
            .await
            .unwrap();
        let service = ContactService::new(ctx);

        let mut ids = Vec::new();
        for i in 0..4 {
            let contact = service
                .create(named(&customer.id, &format!("C{i}"), "Team"))
                .await
                .unwrap();
            ids.push(contact.id);
        }

        let mut handles = Vec::new();
        for round in 0..16 {
            let service = service.clone();
            let customer_id = customer.id.clone();
            let target = ids[round % ids.len()].clone();
            handles.push(tokio::spawn(async move {
                if round % 4 == 3 {
                    service
                        .create(named(&customer_id, &format!("N{round}"), "New").primary())
                        .await
                        .map(|_| ())
                } else {
                    service.set_primary(&target, &customer_id).await
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(primaries(&service, &customer.id).await.len(), 1);
        assert_eq!(service.list_by_customer(&customer.id).await.unwrap().len(), 8);
        db.close().await;
    }
}
