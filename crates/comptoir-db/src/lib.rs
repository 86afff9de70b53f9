//! # comptoir-db: Database Layer for Comptoir
//!
//! SQLite storage for the catalog and CRM, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Data Flow                               │
//! │                                                                         │
//! │  comptoir-service (CustomerService::create)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   comptoir-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ category.rs   │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ customer.rs   │    │ 0001_init    │  │   │
//! │  │   │ SqlitePool    │    │ contact.rs …  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Sequences    │    │  FlagScope    │    │    Retry     │  │   │
//! │  │   │ CLI-2025-0001 │    │ one primary / │    │ busy → back  │  │   │
//! │  │   │               │    │ one default   │    │ off, replay  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`sequence`] - Year-scoped business codes
//! - [`singleton`] - At most one primary contact / default address
//! - [`retry`] - Replay of units of work on lock contention
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comptoir_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("comptoir.db")).await?;
//!
//! let mut tx = db.pool().begin().await?;
//! db.customers().insert(&mut *tx, &customer).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;
pub mod sequence;
pub mod singleton;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::{retry_transient, RetryPolicy, Transient};
pub use sequence::SequenceGenerator;
pub use singleton::{FlagScope, ADDRESS_DEFAULT, CONTACT_PRIMARY};

// Repository re-exports for convenience
pub use repository::address::AddressRepository;
pub use repository::category::CategoryRepository;
pub use repository::contact::ContactRepository;
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::user::UserRepository;
