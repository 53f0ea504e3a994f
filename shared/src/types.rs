//! Common types used across the platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default page size for list endpoints
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination parameters as submitted by a caller
///
/// Values outside the accepted range are clamped rather than rejected:
/// `page` to at least 1 and `limit` to `1..=100`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT as i64)
            .clamp(1, MAX_PAGE_LIMIT as i64) as u32
    }

    /// Number of rows to skip
    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }

    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            page: self.page(),
            limit: self.limit(),
            total,
            has_more: self.offset() + (self.limit() as u64) < total,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: &PageRequest, total: u64) -> Self {
        Self {
            data,
            meta: page.meta(total),
        }
    }
}

/// Inclusive timestamp range for queries; either bound may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_page_defaults() {
        let page = PageRequest::default();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_clamping() {
        let page = PageRequest::new(0, 500);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 100);

        let page = PageRequest::new(-3, 0);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 1);
    }

    #[test]
    fn test_has_more() {
        let page = PageRequest::new(1, 10);
        assert!(page.meta(11).has_more);
        assert!(!page.meta(10).has_more);

        let page = PageRequest::new(2, 10);
        assert_eq!(page.offset(), 10);
        assert!(!page.meta(20).has_more);
        assert!(page.meta(21).has_more);
    }

    #[test]
    fn test_date_range_inclusive() {
        let now = Utc::now();
        let range = DateRange::between(now - Duration::days(1), now);
        assert!(range.contains(now));
        assert!(range.contains(now - Duration::days(1)));
        assert!(!range.contains(now + Duration::seconds(1)));
        assert!(DateRange::default().contains(now));
        assert!(DateRange::between(now, now - Duration::days(1)).is_inverted());
    }
}
