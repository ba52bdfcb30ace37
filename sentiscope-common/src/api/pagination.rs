//! Pagination utilities for history listings

use serde::{Deserialize, Serialize};

/// Default page size for history listings
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&limit=` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Pagination metadata returned to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Page size
    pub limit: i64,
    /// Total number of rows
    pub total: i64,
    /// Total number of pages
    pub total_pages: i64,
}

impl Pagination {
    /// Offset for SQL LIMIT/OFFSET
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Calculate pagination metadata from the total row count and the request
///
/// Page is clamped to at least 1 and the limit to `1..=MAX_PAGE_SIZE`. Pages
/// past the end are not clamped back; they simply return no rows.
///
/// # Examples
/// ```
/// use sentiscope_common::api::{calculate_pagination, PageQuery};
///
/// let p = calculate_pagination(25, &PageQuery { page: Some(2), limit: Some(10) });
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset(), 10);
/// ```
pub fn calculate_pagination(total: i64, query: &PageQuery) -> Pagination {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let total_pages = (total + limit - 1) / limit;

    Pagination {
        page,
        limit,
        total,
        total_pages,
    }
}
