//! Page requests and pagination metadata for listings.

use serde::{Deserialize, Serialize};

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// A requested page (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Builds a request, substituting defaults and clamping the limit.
    pub fn new(page: Option<usize>, limit: Option<usize>, default_limit: usize) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: u64,
    pub limit: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        let total = total_items as usize;
        let total_pages = total.div_ceil(request.limit);
        Self {
            current_page: request.page,
            total_pages,
            total_items,
            limit: request.limit,
            has_next_page: request.page * request.limit < total,
            has_prev_page: request.page > 1,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            pagination: Pagination::new(request, total_items),
        }
    }
}
