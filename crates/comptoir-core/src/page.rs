//! # Pagination
//!
//! Zero-based page requests and result pages for listing endpoints.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Default page size when the caller gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on a page; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page `page` (0-based) of `size` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Builds a request, clamping `size` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        PageRequest {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn first() -> Self {
        PageRequest::new(0, DEFAULT_PAGE_SIZE)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    #[inline]
    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::first()
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = request.size.max(1) as i64;
        Page {
            items,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.page as i64 + 1) < self.total_pages
    }

    /// Converts the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps_and_offsets() {
        let req = PageRequest::new(2, 500);
        assert_eq!(req.size, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 200);
        assert_eq!(PageRequest::new(0, 0).size, 1);
    }

    #[test]
    fn test_page_totals() {
        let page = Page::new(vec![1, 2], PageRequest::new(0, 2), 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let last = Page::new(vec![5], PageRequest::new(2, 2), 5);
        assert!(!last.has_next());

        let empty: Page<i32> = Page::new(vec![], PageRequest::first(), 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], PageRequest::new(1, 2), 4).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_elements, 4);
    }
}
