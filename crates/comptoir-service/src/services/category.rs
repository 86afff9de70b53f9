//! # Category Service
//!
//! Hierarchy manager for the category forest.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update / reparent / delete(id)                                         │
//! │                                                                         │
//! │  1. touch(id)            first statement is a write: the transaction   │
//! │                          owns the write lock before reading the tree   │
//! │  2. load_all → arena     consistent snapshot for the rest of the unit  │
//! │  3. check_parent         self-parent / unknown parent / cycle          │
//! │  4. write + commit                                                      │
//! │                                                                         │
//! │  Two concurrent moves (A under B, B under A) serialize at step 1; the  │
//! │  second sees the first one's result and is rejected as a cycle.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use comptoir_core::hierarchy::{CategoryArena, CategoryTree};
use comptoir_core::validation::{non_blank, validate_category_input, validate_search_query};
use comptoir_core::{
    new_id, Category, CategoryFilter, CategoryInput, CategoryView, Page, PageRequest, SequenceType,
    ValidationError,
};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub total: i64,
    pub active: i64,
    pub roots: i64,
}

#[derive(Clone)]
pub struct CategoryService {
    ctx: ServiceContext,
}

impl CategoryService {
    pub fn new(ctx: ServiceContext) -> Self {
        CategoryService { ctx }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a category. A blank code is generated (`CAT-2025-0001`); a
    /// missing or zero sort order appends after the last sibling.
    pub async fn create(&self, input: CategoryInput) -> ServiceResult<Category> {
        validate_category_input(&input)?;
        let category = self.ctx.run("category.create", || self.create_once(&input)).await?;
        info!(id = %category.id, code = %category.code, "Category created");
        Ok(category)
    }

    async fn create_once(&self, input: &CategoryInput) -> ServiceResult<Category> {
        let repo = self.ctx.db().categories();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let parent_id = clean(&input.parent_id);
        if let Some(parent) = &parent_id {
            if !repo.touch(&mut *tx, parent, now).await? {
                return Err(ValidationError::missing("Category", "parent_id", parent.clone()).into());
            }
        }
        let code = match non_blank(input.code.as_deref()) {
            Some(code) => code.to_string(),
            None => self.ctx.sequences().next_for(&mut tx, SequenceType::Category).await?,
        };

        let arena = CategoryArena::new(repo.load_all(&mut *tx).await?);
        let id = new_id();
        arena.check_parent(&id, parent_id.as_deref())?;

        let sort_order = match input.sort_order {
            Some(order) if order != 0 => order,
            _ => arena.next_sort_order(parent_id.as_deref()),
        };

        let category = Category {
            id,
            code,
            name: input.name.trim().to_string(),
            description: clean(&input.description),
            parent_id,
            sort_order,
            active: input.active,
            image_url: clean(&input.image_url),
            icon_class: clean(&input.icon_class),
            created_at: now,
            updated_at: now,
        };
        repo.insert(&mut *tx, &category).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Replaces every field. A blank code keeps the current one, a missing
    /// or zero sort order keeps the current position.
    pub async fn update(&self, id: &str, input: CategoryInput) -> ServiceResult<Category> {
        validate_category_input(&input)?;
        let category = self.ctx.run("category.update", || self.update_once(id, &input)).await?;
        info!(id, code = %category.code, "Category updated");
        Ok(category)
    }

    async fn update_once(&self, id: &str, input: &CategoryInput) -> ServiceResult<Category> {
        let repo = self.ctx.db().categories();
        let now = self.ctx.now();
        let mut tx = self.ctx.db().pool().begin().await?;

        let (arena, current) = self.lock_and_load(&mut tx, id).await?;
        let parent_id = clean(&input.parent_id);
        arena.check_parent(id, parent_id.as_deref())?;

        let category = Category {
            id: current.id.clone(),
            code: non_blank(input.code.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| current.code.clone()),
            name: input.name.trim().to_string(),
            description: clean(&input.description),
            parent_id,
            sort_order: match input.sort_order {
                Some(order) if order != 0 => order,
                _ => current.sort_order,
            },
            active: input.active,
            image_url: clean(&input.image_url),
            icon_class: clean(&input.icon_class),
            created_at: current.created_at,
            updated_at: now,
        };
        repo.update(&mut *tx, &category).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Moves a category (and its subtree) under `new_parent`, or to the
    /// roots with `None`. The node goes last among its new siblings.
    pub async fn reparent(&self, id: &str, new_parent: Option<&str>) -> ServiceResult<Category> {
        let new_parent = non_blank(new_parent);
        let category = self
            .ctx
            .run("category.reparent", || self.reparent_once(id, new_parent))
            .await?;
        info!(id, parent_id = ?category.parent_id, "Category moved");
        Ok(category)
    }

    async fn reparent_once(&self, id: &str, new_parent: Option<&str>) -> ServiceResult<Category> {
        let repo = self.ctx.db().categories();
        let mut tx = self.ctx.db().pool().begin().await?;

        let (arena, mut category) = self.lock_and_load(&mut tx, id).await?;
        if category.parent_id.as_deref() == new_parent {
            tx.commit().await?;
            return Ok(category);
        }
        arena.check_parent(id, new_parent)?;

        category.parent_id = new_parent.map(str::to_string);
        category.sort_order = arena.next_sort_order(new_parent);
        category.updated_at = self.ctx.now();
        repo.update(&mut *tx, &category).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Deletes a leaf category without products.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.ctx.run("category.delete", || self.delete_once(id)).await?;
        info!(id, "Category deleted");
        Ok(())
    }

    async fn delete_once(&self, id: &str) -> ServiceResult<()> {
        let repo = self.ctx.db().categories();
        let mut tx = self.ctx.db().pool().begin().await?;

        if !repo.touch(&mut *tx, id, self.ctx.now()).await? {
            return Err(ServiceError::not_found("Category", id));
        }
        let children = repo.count_children(&mut *tx, id).await?;
        if children > 0 {
            return Err(dependents(id, format!("it has {children} subcategories")));
        }
        let products = repo.count_products(&mut *tx, id).await?;
        if products > 0 {
            return Err(dependents(id, format!("it holds {products} products")));
        }
        repo.delete(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Takes the write lock through `id`'s row, then snapshots the tree.
    async fn lock_and_load(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> ServiceResult<(CategoryArena, Category)> {
        let repo = self.ctx.db().categories();
        if !repo.touch(&mut *conn, id, self.ctx.now()).await? {
            return Err(ServiceError::not_found("Category", id));
        }
        let arena = CategoryArena::new(repo.load_all(&mut *conn).await?);
        let current = arena
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Category", id))?;
        Ok((arena, current))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> ServiceResult<Category> {
        self.ctx
            .db()
            .categories()
            .get(self.ctx.db().pool(), id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    pub async fn find_by_code(&self, code: &str) -> ServiceResult<Category> {
        self.ctx
            .db()
            .categories()
            .find_by_code(self.ctx.db().pool(), code.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", code))
    }

    pub async fn list_roots(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.ctx.db().categories().list_children(None).await?)
    }

    pub async fn list_children(&self, parent_id: &str) -> ServiceResult<Vec<Category>> {
        self.get(parent_id).await?;
        Ok(self.ctx.db().categories().list_children(Some(parent_id)).await?)
    }

    pub async fn list_active(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.ctx.db().categories().list_active().await?)
    }

    /// Whole forest, or the subtree under `root`.
    pub async fn find_tree(&self, root: Option<&str>) -> ServiceResult<Vec<CategoryTree>> {
        let arena = self.arena().await?;
        match root {
            None => Ok(arena.forest()),
            Some(id) => Ok(vec![arena.subtree(id)?]),
        }
    }

    /// Root-to-node path, the node itself last.
    pub async fn find_path(&self, id: &str) -> ServiceResult<Vec<Category>> {
        let arena = self.arena().await?;
        Ok(arena.path(id)?.into_iter().cloned().collect())
    }

    pub async fn search(&self, filter: CategoryFilter, page: PageRequest) -> ServiceResult<Page<Category>> {
        let filter = CategoryFilter {
            search: validate_search_query(filter.search.as_deref())?,
            parent_id: clean(&filter.parent_id),
            ..filter
        };
        Ok(self.ctx.db().categories().search(&filter, page).await?)
    }

    pub async fn counts(&self) -> ServiceResult<CategoryCounts> {
        let (total, active, roots) = self.ctx.db().categories().counts().await?;
        Ok(CategoryCounts { total, active, roots })
    }

    /// Read model: parent, depth, path, children and product counts.
    pub async fn view(&self, id: &str) -> ServiceResult<CategoryView> {
        let arena = self.arena().await?;
        let category = arena
            .get(id)
            .ok_or_else(|| ServiceError::not_found("Category", id))?;
        let products = self
            .ctx
            .db()
            .categories()
            .count_products(self.ctx.db().pool(), id)
            .await?;
        Ok(CategoryView::build(&arena, category, products)?)
    }

    /// Read models for a search page.
    pub async fn search_views(
        &self,
        filter: CategoryFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<CategoryView>> {
        let found = self.search(filter, page).await?;
        let arena = self.arena().await?;
        let product_counts = self.ctx.db().categories().product_counts().await?;

        let mut views = Vec::with_capacity(found.items.len());
        for category in &found.items {
            let products = product_counts.get(&category.id).copied().unwrap_or(0);
            views.push(CategoryView::build(&arena, category, products)?);
        }
        Ok(Page::new(views, page, found.total_elements))
    }

    async fn arena(&self) -> ServiceResult<CategoryArena> {
        let rows = self.ctx.db().categories().load_all(self.ctx.db().pool()).await?;
        Ok(CategoryArena::new(rows))
    }
}

fn dependents(id: &str, reason: String) -> ServiceError {
    ValidationError::HasDependents {
        entity: "Category".to_string(),
        id: id.to_string(),
        reason,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::ProductService;
    use chrono::NaiveDate;
    use comptoir_core::{FixedClock, ProductInput};
    use comptoir_db::{Database, DbConfig};
    use std::sync::Arc;

    async fn ctx() -> ServiceContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        ServiceContext::new(db).with_clock(Arc::new(clock))
    }

    #[tokio::test]
    async fn test_create_generates_codes_and_sort_orders() {
        let service = CategoryService::new(ctx().await);
        let drinks = service.create(CategoryInput::named("Boissons")).await.unwrap();
        assert_eq!(drinks.code, "CAT-2025-0001");
        assert_eq!(drinks.sort_order, 10);

        let sodas = service
            .create(CategoryInput::named("Sodas").under(&drinks.id))
            .await
            .unwrap();
        let juices = service
            .create(CategoryInput::named("Jus").under(&drinks.id))
            .await
            .unwrap();
        assert_eq!(sodas.code, "CAT-2025-0002");
        assert_eq!((sodas.sort_order, juices.sort_order), (10, 20));

        let mut custom = CategoryInput::named("Epicerie");
        custom.code = Some("EPI".to_string());
        custom.sort_order = Some(5);
        let grocery = service.create(custom).await.unwrap();
        assert_eq!((grocery.code.as_str(), grocery.sort_order), ("EPI", 5));

        let roots: Vec<String> = service.list_roots().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(roots, vec!["Epicerie", "Boissons"]);
    }

    #[tokio::test]
    async fn test_create_under_unknown_parent_is_rejected() {
        let service = CategoryService::new(ctx().await);
        let err = service
            .create(CategoryInput::named("Orphan").under("no-such-id"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingRelation { .. })
        ));
        assert_eq!(service.counts().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_reparent_under_descendant_is_rejected() {
        let service = CategoryService::new(ctx().await);
        let a = service.create(CategoryInput::named("A")).await.unwrap();
        let b = service.create(CategoryInput::named("B").under(&a.id)).await.unwrap();
        let c = service.create(CategoryInput::named("C").under(&b.id)).await.unwrap();

        let err = service.reparent(&a.id, Some(&c.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::CyclicParent { .. })));
        let err = service.reparent(&a.id, Some(&a.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::SelfParent { .. })));

        // Unchanged after the rejected moves.
        assert_eq!(service.get(&a.id).await.unwrap().parent_id, None);

        let moved = service.reparent(&c.id, None).await.unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(moved.sort_order, 20);
        let path: Vec<String> = service.find_path(&b.id).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(path, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_update_rejects_cycle_and_keeps_code() {
        let service = CategoryService::new(ctx().await);
        let a = service.create(CategoryInput::named("A")).await.unwrap();
        let b = service.create(CategoryInput::named("B").under(&a.id)).await.unwrap();

        let err = service
            .update(&a.id, CategoryInput::named("A").under(&b.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let renamed = service.update(&b.id, CategoryInput::named("B2").under(&a.id)).await.unwrap();
        assert_eq!(renamed.code, b.code);
        assert_eq!(renamed.sort_order, b.sort_order);
        assert_eq!(renamed.created_at, b.created_at);

        let err = service.update("missing", CategoryInput::named("X")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_children_and_products() {
        let ctx = ctx().await;
        let service = CategoryService::new(ctx.clone());
        let products = ProductService::new(ctx);
        let root = service.create(CategoryInput::named("Root")).await.unwrap();
        let leaf = service.create(CategoryInput::named("Leaf").under(&root.id)).await.unwrap();
        let product = products.create(ProductInput::new("Cola", &leaf.id, 150)).await.unwrap();

        let err = service.delete(&root.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::HasDependents { .. })));
        let err = service.delete(&leaf.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::HasDependents { .. })));

        // Both categories and their relations survive the refused deletes.
        let kept_root = service.get(&root.id).await.unwrap();
        assert_eq!(kept_root.code, root.code);
        assert!(kept_root.parent_id.is_none());
        let kept_leaf = service.get(&leaf.id).await.unwrap();
        assert_eq!(kept_leaf.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(products.get(&product.id).await.unwrap().category_id, leaf.id);

        products.delete(&product.id).await.unwrap();
        service.delete(&leaf.id).await.unwrap();
        service.delete(&root.id).await.unwrap();
        assert_eq!(service.delete(&root.id).await.unwrap_err().code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_tree_and_views() {
        let ctx = ctx().await;
        let service = CategoryService::new(ctx.clone());
        let drinks = service.create(CategoryInput::named("Boissons")).await.unwrap();
        let sodas = service.create(CategoryInput::named("Sodas").under(&drinks.id)).await.unwrap();
        service.create(CategoryInput::named("Colas").under(&sodas.id)).await.unwrap();
        ProductService::new(ctx)
            .create(ProductInput::new("Cola 33cl", &sodas.id, 120))
            .await
            .unwrap();

        let forest = service.find_tree(None).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 3);

        let subtree = service.find_tree(Some(&sodas.id)).await.unwrap();
        assert_eq!(subtree[0].path, "Boissons > Sodas");
        assert_eq!(subtree[0].children[0].path, "Boissons > Sodas > Colas");

        let view = service.view(&sodas.id).await.unwrap();
        assert_eq!(view.depth, 1);
        assert_eq!(view.parent_name.as_deref(), Some("Boissons"));
        assert_eq!(view.children_count, 1);
        assert_eq!(view.product_count, 1);

        let filter = CategoryFilter {
            search: Some("  soda ".to_string()),
            ..Default::default()
        };
        let page = service.search_views(filter, PageRequest::first()).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.items[0].full_path, "Boissons > Sodas");

        assert_eq!(
            service.counts().await.unwrap(),
            CategoryCounts { total: 3, active: 3, roots: 1 }
        );
    }
}
