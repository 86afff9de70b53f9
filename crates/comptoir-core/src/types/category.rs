//! Catalog categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A node of the category forest.
///
/// `parent_id` is a weak reference by id; the tree shape is rebuilt from
/// the flat rows by [`crate::hierarchy::CategoryArena`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business code (`CAT-2025-0001` or caller supplied).
    pub code: String,

    pub name: String,
    pub description: Option<String>,

    /// Parent category, `None` for roots.
    pub parent_id: Option<String>,

    /// Position among siblings. Gaps of 10 leave room for manual moves.
    pub sort_order: i32,

    pub active: bool,
    pub image_url: Option<String>,
    pub icon_class: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Caller-supplied fields for creating or replacing a category.
///
/// `code: None` asks for a generated code on create and keeps the current
/// one on update. `sort_order: None` (or `Some(0)`) appends after the last
/// sibling on create and keeps the current position on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryInput {
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub sort_order: Option<i32>,
    pub active: bool,
    pub image_url: Option<String>,
    pub icon_class: Option<String>,
}

impl CategoryInput {
    /// Minimal active category with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        CategoryInput {
            name: name.into(),
            active: true,
            ..Default::default()
        }
    }

    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Search criteria for category listings. `None` means "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryFilter {
    pub active: Option<bool>,
    pub parent_id: Option<String>,
    /// Case-insensitive match on code, name or description.
    pub search: Option<String>,
}
