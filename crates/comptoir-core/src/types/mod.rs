//! # Domain Types
//!
//! Entities, caller inputs and search filters for Comptoir.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                         CRM                                    │
//! │  ┌─────────────────┐             ┌─────────────────┐                   │
//! │  │    Category     │◄─┐          │    Customer     │  scope            │
//! │  │  parent_id ─────┼──┘          │  code CLI-...   │◄──────┐           │
//! │  │  code CAT-...   │             └─────────────────┘       │           │
//! │  └────────▲────────┘             ┌─────────────────┐       │           │
//! │           │ category_id          │    Address      │ is_default        │
//! │  ┌────────┴────────┐             └─────────────────┘       │           │
//! │  │     Product     │             ┌─────────────────┐       │           │
//! │  │  code PRD-...   │             │     Contact     │ is_primary        │
//! │  └─────────────────┘             │  code CNT-...   │───────┘           │
//! │                                  └─────────────────┘                   │
//! │  Security: User ──< user_roles >── Role ──< role_permissions >── Perm  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - `code` (or `username`/`name`): human-readable natural key

pub mod category;
pub mod contact;
pub mod customer;
pub mod product;
pub mod user;

pub use category::*;
pub use contact::*;
pub use customer::*;
pub use product::*;
pub use user::*;

/// Generates a new entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
