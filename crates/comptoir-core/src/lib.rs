//! # comptoir-core: Pure Business Logic for Comptoir
//!
//! Domain types, validation and the pure halves of the invariant
//! enforcers. Zero I/O: everything here is deterministic and testable
//! without a database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                comptoir-service (Domain Services)               │   │
//! │  │   CustomerService  CategoryService  ProductService  Contact...  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                comptoir-db (Database Layer)                     │   │
//! │  │   SequenceGenerator   FlagScope (singleton)   Repositories      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ comptoir-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   types   sequence   hierarchy   validation   money   views    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities, inputs and filters (Category, Product, Customer, Contact, User)
//! - [`sequence`] - Counter rows and the `PREFIX-YEAR-0001` code format
//! - [`hierarchy`] - Category arena: depth, paths, cycle checks, forest
//! - [`validation`] - Field and business-rule validation
//! - [`money`] - Integer money and VAT rates
//! - [`views`] - Enriched read models
//! - [`page`] - Pagination
//! - [`clock`] - Injectable time source
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use comptoir_core::sequence::{format_code, SequenceType};
//!
//! let t = SequenceType::Customer;
//! assert_eq!(format_code(t.prefix(), 2025, 1, 4), "CLI-2025-0001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod hierarchy;
pub mod money;
pub mod page;
pub mod sequence;
pub mod types;
pub mod validation;
pub mod views;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use hierarchy::{CategoryArena, CategoryTree};
pub use money::{Money, VatRate};
pub use page::{Page, PageRequest};
pub use sequence::{Counter, SequenceType};
pub use types::*;
pub use views::{CategoryView, ContactView, CustomerView, ProductView};
