//! Pagination types

use serde::{Deserialize, Serialize};

/// Pagination parameters (1-indexed page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Parse a raw `?page=` value leniently: anything that isn't a positive
    /// integer means the first page.
    pub fn from_query(raw: Option<&str>, per_page: u32) -> Self {
        let page = raw
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(page, per_page)
    }

    /// Clamp the page into `1..=total_pages` for `total` items
    pub fn clamp_to(self, total: i64) -> Self {
        let pages = total_pages(total, self.per_page);
        Self {
            page: self.page.min(pages),
            per_page: self.per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Number of pages for `total` items; an empty list still has one page.
fn total_pages(total: i64, per_page: u32) -> u32 {
    if total <= 0 || per_page == 0 {
        return 1;
    }
    let per_page = per_page as i64;
    ((total + per_page - 1) / per_page) as u32
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
