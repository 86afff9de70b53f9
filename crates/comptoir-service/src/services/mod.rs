//! Domain services.
//!
//! One struct per aggregate, each holding a [`ServiceContext`](crate::context::ServiceContext). Mutations
//! go through `ctx.run(..)` so they are replayed as a whole on lock
//! contention; reads go straight to the pool.

use comptoir_core::validation::non_blank;

pub mod category;
pub mod contact;
pub mod customer;
pub mod product;
pub mod user;

pub use category::{CategoryCounts, CategoryService};
pub use contact::{ContactCounts, ContactService};
pub use customer::{CustomerCounts, CustomerService};
pub use product::{ProductCounts, ProductService};
pub use user::UserService;

/// Trimmed copy of an optional text field, `None` when blank.
pub(crate) fn clean(value: &Option<String>) -> Option<String> {
    non_blank(value.as_deref()).map(str::to_string)
}
