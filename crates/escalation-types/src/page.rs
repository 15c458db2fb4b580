//! Page-number pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

/// A validated page request (1-based page, bounded limit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page >= 1, limit within `1..=max_limit`.
    pub fn clamped(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    /// Row offset; saturates for absurd page numbers instead of overflowing.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::clamped(Some(0), Some(500), 50, 100);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);
        let req = PageRequest::clamped(None, Some(-3), 50, 100);
        assert_eq!(req.limit, 1);
        let req = PageRequest::clamped(Some(3), None, 50, 100);
        assert_eq!(req.offset(), 100);
    }

    #[test]
    fn test_offset_saturates_on_huge_page() {
        let req = PageRequest::clamped(Some(i64::MAX), Some(50), 50, 100);
        assert_eq!(req.offset(), i64::MAX);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let req = PageRequest { page: 1, limit: 20 };
        assert_eq!(Pagination::new(req, 0).total_pages, 0);
        assert_eq!(Pagination::new(req, 20).total_pages, 1);
        assert_eq!(Pagination::new(req, 21).total_pages, 2);
    }
}
