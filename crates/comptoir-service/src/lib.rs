//! # comptoir-service: Domain Services for Comptoir
//!
//! The operations outer layers call: catalog (categories, products), CRM
//! (customers, addresses, contacts) and access control (users, roles).
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller                                                                 │
//! │     │  ContactService::set_primary(contact, customer)                   │
//! │     ▼                                                                   │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                 comptoir-service (THIS CRATE)                     │ │
//! │  │                                                                   │ │
//! │  │  validate input (comptoir-core)                                  │ │
//! │  │     │                                                             │ │
//! │  │     ▼                                                             │ │
//! │  │  ctx.run ── begin ─► sequences / flags / repositories ─► commit  │ │
//! │  │     │                                                             │ │
//! │  │     └── transient (busy, flag race) ─► backoff ─► replay          │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Ok(entity) │ ServiceError { code: VALIDATION_ERROR | NOT_FOUND | … }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`context`] - Shared database, clock and retry handles
//! - [`error`] - Service errors and their machine-readable codes
//! - [`services`] - One service per aggregate
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comptoir_service::{AppConfig, Comptoir};
//!
//! let config = AppConfig::load()?;
//! let app = Comptoir::open(&config).await?;
//!
//! let customer = app.customers.create(CustomerInput::new("Acme")).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod services;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use context::ServiceContext;
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use services::{
    CategoryCounts, CategoryService, ContactCounts, ContactService, CustomerCounts,
    CustomerService, ProductCounts, ProductService, UserService,
};
pub use telemetry::init_tracing;

use comptoir_db::Database;

/// Every service over one shared context.
#[derive(Clone)]
pub struct Comptoir {
    pub categories: CategoryService,
    pub products: ProductService,
    pub customers: CustomerService,
    pub contacts: ContactService,
    pub users: UserService,
    ctx: ServiceContext,
}

impl Comptoir {
    pub fn new(ctx: ServiceContext) -> Self {
        Comptoir {
            categories: CategoryService::new(ctx.clone()),
            products: ProductService::new(ctx.clone()),
            customers: CustomerService::new(ctx.clone()),
            contacts: ContactService::new(ctx.clone()),
            users: UserService::new(ctx.clone()),
            ctx,
        }
    }

    /// Opens (and migrates) the configured database.
    pub async fn open(config: &AppConfig) -> ServiceResult<Self> {
        config.validate().map_err(|e| ServiceError::Internal(e.to_string()))?;
        let db = Database::new(config.db_config()).await?;
        Ok(Comptoir::new(ServiceContext::from_config(db, config)))
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub async fn close(&self) {
        self.ctx.db().close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptoir_core::{CategoryInput, ContactInput, CustomerInput, ProductInput};

    #[tokio::test]
    async fn test_open_file_database_and_use_every_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("comptoir.db"),
            ..AppConfig::default()
        };
        let app = Comptoir::open(&config).await.unwrap();

        let drinks = app.categories.create(CategoryInput::named("Boissons")).await.unwrap();
        app.products.create(ProductInput::new("Cola", &drinks.id, 150)).await.unwrap();
        let acme = app.customers.create(CustomerInput::new("Acme")).await.unwrap();
        app.contacts
            .create(ContactInput::new(&acme.id, "Jean").primary())
            .await
            .unwrap();

        let view = app.customers.view(&acme.id).await.unwrap();
        assert_eq!(view.contact_count, 1);
        assert_eq!(view.primary_contact.as_deref(), Some("Jean"));
        assert_eq!(app.products.counts().await.unwrap().total, 1);
        assert!(app.context().db().health_check().await);
        app.close().await;
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let config = AppConfig {
            code_padding: 0,
            ..AppConfig::default()
        };
        let result = Comptoir::open(&config).await;
        assert!(matches!(result, Err(ref e) if e.code() == ErrorCode::DatabaseError));
    }
}
