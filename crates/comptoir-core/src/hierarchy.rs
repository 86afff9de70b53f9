//! # Category Hierarchy
//!
//! Arena model of the category forest: every node lives in one indexed
//! `Vec`, parent/child links are indexes, never owning pointers.
//!
//! ## Arena Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  nodes    [0] Boissons   [1] Sodas   [2] Eaux   [3] Épicerie            │
//! │  parents  [0] None       [1] Some(0) [2] Some(0)[3] None                │
//! │  children  None → [0, 3]   0 → [1, 2]                                   │
//! │                                                                         │
//! │  Boissons (depth 0)                                                     │
//! │   ├── Sodas  (depth 1, path "Boissons > Sodas")                        │
//! │   └── Eaux   (depth 1, path "Boissons > Eaux")                         │
//! │  Épicerie (depth 0)                                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cycle Check
//! Reparenting `node` under `parent` walks from `parent` up to its root
//! comparing ids. Meeting `node` on the way means `parent` is a
//! descendant of `node`, and the move is rejected. Every walk is bounded
//! by the node count, so a corrupt store yields an error instead of a hang.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Category;

/// Separator used in display paths.
pub const PATH_SEPARATOR: &str = " > ";

/// Gap left between consecutive siblings.
pub const SORT_ORDER_STEP: i32 = 10;

// =============================================================================
// Arena
// =============================================================================

/// Snapshot of the whole category table, indexed for tree queries.
#[derive(Debug, Clone, Default)]
pub struct CategoryArena {
    nodes: Vec<Category>,
    index: HashMap<String, usize>,
    parents: Vec<Option<usize>>,
    /// Child indexes per parent (`None` = roots), sorted by sort order then name.
    children: HashMap<Option<usize>, Vec<usize>>,
}

impl CategoryArena {
    /// Builds the arena from flat rows.
    ///
    /// A `parent_id` pointing outside the snapshot is treated as a root.
    pub fn new(nodes: Vec<Category>) -> Self {
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let parents: Vec<Option<usize>> = nodes
            .iter()
            .map(|c| c.parent_id.as_ref().and_then(|p| index.get(p).copied()))
            .collect();

        let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
        for (i, parent) in parents.iter().enumerate() {
            children.entry(*parent).or_default().push(i);
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| {
                let (a, b) = (&nodes[*a], &nodes[*b]);
                a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name))
            });
        }

        CategoryArena {
            nodes,
            index,
            parents,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.index.get(id).map(|i| &self.nodes[*i])
    }

    fn idx(&self, id: &str) -> CoreResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CoreError::CategoryNotFound(id.to_string()))
    }

    /// Indexes from `start`'s parent up to its root.
    fn ancestor_indexes(&self, start: usize) -> CoreResult<Vec<usize>> {
        let mut chain = Vec::new();
        let mut current = self.parents[start];
        while let Some(i) = current {
            if chain.len() >= self.nodes.len() {
                return Err(CoreError::CorruptHierarchy {
                    id: self.nodes[start].id.clone(),
                });
            }
            chain.push(i);
            current = self.parents[i];
        }
        Ok(chain)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> CoreResult<Vec<&Category>> {
        let start = self.idx(id)?;
        Ok(self
            .ancestor_indexes(start)?
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect())
    }

    /// `depth(root) = 0`, `depth(n) = depth(parent) + 1`.
    pub fn depth(&self, id: &str) -> CoreResult<usize> {
        let start = self.idx(id)?;
        Ok(self.ancestor_indexes(start)?.len())
    }

    /// Root-to-node ordered list, `id` included last.
    pub fn path(&self, id: &str) -> CoreResult<Vec<&Category>> {
        let start = self.idx(id)?;
        let mut path: Vec<&Category> = self
            .ancestor_indexes(start)?
            .into_iter()
            .rev()
            .map(|i| &self.nodes[i])
            .collect();
        path.push(&self.nodes[start]);
        Ok(path)
    }

    /// Display path: `Boissons > Sodas > Colas`.
    pub fn full_path(&self, id: &str) -> CoreResult<String> {
        Ok(self
            .path(id)?
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR))
    }

    /// Validates giving `node_id` the parent `proposed`.
    ///
    /// `node_id` may be absent from the arena (a node being created); only
    /// existence of the parent is checked then.
    ///
    /// ## Errors
    /// - `SelfParent` when `proposed == node_id`
    /// - `MissingRelation` when `proposed` is unknown
    /// - `CyclicParent` when `proposed` descends from `node_id`
    pub fn check_parent(&self, node_id: &str, proposed: Option<&str>) -> CoreResult<()> {
        let Some(parent_id) = proposed else {
            return Ok(());
        };
        if parent_id == node_id {
            return Err(ValidationError::SelfParent {
                id: node_id.to_string(),
            }
            .into());
        }
        let parent = self
            .index
            .get(parent_id)
            .copied()
            .ok_or_else(|| ValidationError::missing("Category", "parent_id", parent_id))?;

        if self.nodes[parent].id == node_id
            || self
                .ancestor_indexes(parent)?
                .into_iter()
                .any(|i| self.nodes[i].id == node_id)
        {
            return Err(ValidationError::CyclicParent {
                id: node_id.to_string(),
                parent_id: parent_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Direct children of `parent` (`None` = roots), in display order.
    pub fn children(&self, parent: Option<&str>) -> Vec<&Category> {
        let key = match parent {
            Some(id) => match self.index.get(id) {
                Some(i) => Some(*i),
                None => return Vec::new(),
            },
            None => None,
        };
        self.children
            .get(&key)
            .map(|list| list.iter().map(|i| &self.nodes[*i]).collect())
            .unwrap_or_default()
    }

    /// Sort order for a new last child of `parent`.
    pub fn next_sort_order(&self, parent: Option<&str>) -> i32 {
        next_sort_order(self.children(parent).iter().map(|c| c.sort_order))
    }

    /// Number of nodes below `id`.
    pub fn descendant_count(&self, id: &str) -> CoreResult<usize> {
        let start = self.idx(id)?;
        let mut count = 0;
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if count > self.nodes.len() {
                return Err(CoreError::CorruptHierarchy { id: id.to_string() });
            }
            if let Some(kids) = self.children.get(&Some(i)) {
                count += kids.len();
                stack.extend(kids.iter().copied());
            }
        }
        Ok(count)
    }

    /// The whole forest with children populated, roots in display order.
    ///
    /// Nodes caught in a stored cycle are unreachable from any root and
    /// therefore left out.
    pub fn forest(&self) -> Vec<CategoryTree> {
        self.children
            .get(&None)
            .map(|roots| roots.iter().map(|r| self.build(*r, 0, None)).collect())
            .unwrap_or_default()
    }

    /// Subtree rooted at `id`.
    pub fn subtree(&self, id: &str) -> CoreResult<CategoryTree> {
        let start = self.idx(id)?;
        let depth = self.ancestor_indexes(start)?.len();
        let parent_path = match self.parents[start] {
            Some(p) => Some(self.full_path(&self.nodes[p].id)?),
            None => None,
        };
        Ok(self.build(start, depth, parent_path.as_deref()))
    }

    fn build(&self, i: usize, depth: usize, parent_path: Option<&str>) -> CategoryTree {
        let category = &self.nodes[i];
        let path = match parent_path {
            Some(p) => format!("{p}{PATH_SEPARATOR}{}", category.name),
            None => category.name.clone(),
        };
        let children = self
            .children
            .get(&Some(i))
            .map(|kids| {
                kids.iter()
                    .map(|k| self.build(*k, depth + 1, Some(&path)))
                    .collect()
            })
            .unwrap_or_default();
        CategoryTree {
            category: category.clone(),
            depth,
            path,
            children,
        }
    }
}

// =============================================================================
// Tree
// =============================================================================

/// A category with its children populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub category: Category,
    pub depth: usize,
    pub path: String,
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(CategoryTree::size).sum::<usize>()
    }
}

/// `max(sibling sort orders, or 0) + 10`.
///
/// ## Example
/// ```rust
/// use comptoir_core::hierarchy::next_sort_order;
///
/// assert_eq!(next_sort_order([]), 10);
/// assert_eq!(next_sort_order([10, 30, 20]), 40);
/// ```
pub fn next_sort_order(siblings: impl IntoIterator<Item = i32>) -> i32 {
    siblings
        .into_iter()
        .max()
        .unwrap_or(0)
        .saturating_add(SORT_ORDER_STEP)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cat(id: &str, name: &str, parent: Option<&str>, sort_order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: id.to_string(),
            code: id.to_uppercase(),
            name: name.to_string(),
            description: None,
            parent_id: parent.map(str::to_string),
            sort_order,
            active: true,
            image_url: None,
            icon_class: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// boissons ─┬─ sodas ── colas
    ///           └─ eaux
    /// epicerie
    fn sample() -> CategoryArena {
        CategoryArena::new(vec![
            cat("colas", "Colas", Some("sodas"), 10),
            cat("eaux", "Eaux", Some("boissons"), 20),
            cat("boissons", "Boissons", None, 10),
            cat("sodas", "Sodas", Some("boissons"), 10),
            cat("epicerie", "Épicerie", None, 20),
        ])
    }

    #[test]
    fn test_depth_and_path() {
        let arena = sample();
        assert_eq!(arena.depth("boissons").unwrap(), 0);
        assert_eq!(arena.depth("colas").unwrap(), 2);
        assert_eq!(arena.full_path("colas").unwrap(), "Boissons > Sodas > Colas");

        let path: Vec<&str> = arena
            .path("colas")
            .unwrap()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(path, vec!["boissons", "sodas", "colas"]);
    }

    #[test]
    fn test_reparent_under_descendant_is_cycle() {
        let arena = sample();
        let err = arena.check_parent("boissons", Some("colas")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::CyclicParent { .. })
        ));
        let err = arena.check_parent("sodas", Some("sodas")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::SelfParent { .. })
        ));
    }

    #[test]
    fn test_valid_moves_accepted() {
        let arena = sample();
        assert!(arena.check_parent("colas", Some("epicerie")).is_ok());
        assert!(arena.check_parent("sodas", None).is_ok());
        // New node not yet in the arena
        assert!(arena.check_parent("new", Some("colas")).is_ok());
        assert!(matches!(
            arena.check_parent("new", Some("ghost")),
            Err(CoreError::Validation(ValidationError::MissingRelation { .. }))
        ));
    }

    #[test]
    fn test_corrupt_cycle_is_reported() {
        let arena = CategoryArena::new(vec![
            cat("a", "A", Some("b"), 10),
            cat("b", "B", Some("a"), 10),
        ]);
        assert!(matches!(
            arena.depth("a"),
            Err(CoreError::CorruptHierarchy { .. })
        ));
        assert!(arena.forest().is_empty());
    }

    #[test]
    fn test_children_sorted_and_next_sort_order() {
        let arena = sample();
        let names: Vec<&str> = arena
            .children(Some("boissons"))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Sodas", "Eaux"]);
        assert_eq!(arena.next_sort_order(Some("boissons")), 30);
        assert_eq!(arena.next_sort_order(Some("eaux")), 10);
        assert_eq!(arena.next_sort_order(None), 30);
    }

    #[test]
    fn test_forest() {
        let arena = sample();
        let forest = arena.forest();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].category.id, "boissons");
        assert_eq!(forest[0].size(), 4);
        let colas = &forest[0].children[0].children[0];
        assert_eq!(colas.depth, 2);
        assert_eq!(colas.path, "Boissons > Sodas > Colas");
        assert_eq!(arena.descendant_count("boissons").unwrap(), 3);
    }

    #[test]
    fn test_subtree_keeps_absolute_depth() {
        let arena = sample();
        let sodas = arena.subtree("sodas").unwrap();
        assert_eq!(sodas.depth, 1);
        assert_eq!(sodas.path, "Boissons > Sodas");
        assert_eq!(sodas.children[0].path, "Boissons > Sodas > Colas");
    }

    #[test]
    fn test_next_sort_order_saturates() {
        assert_eq!(next_sort_order([i32::MAX]), i32::MAX);
    }
}
