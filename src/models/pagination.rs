use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Pagination parameters (1-indexed pages)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
    /// Create new pagination parameters, clamping into `1..=100`
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Create pagination parameters, rejecting values outside the allowed range
    pub fn checked(page: u32, per_page: u32, max_per_page: u32) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::new("page must be at least 1"));
        }
        if per_page < 1 || per_page > max_per_page {
            return Err(ValidationError::new(format!(
                "items_per_page must be between 1 and {}",
                max_per_page
            )));
        }
        Ok(Self { page, per_page })
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
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

    /// Map the items while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total.max(0) as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offset() {
        assert_eq!(ListParams::new(1, 10).offset(), 0);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_new_clamps() {
        let params = ListParams::new(0, 1000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(ListParams::checked(0, 10, 100).is_err());
        assert!(ListParams::checked(1, 0, 100).is_err());
        assert!(ListParams::checked(1, 51, 50).is_err());
        assert!(ListParams::checked(2, 50, 50).is_ok());
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages(), 2);
    }

    proptest! {
        #[test]
        fn pages_cover_all_items(total in 0i64..10_000, per_page in 1u32..=100) {
            let params = ListParams::new(1, per_page);
            let result = PagedResult::<()>::new(vec![], total, &params);
            let capacity = result.total_pages() as i64 * per_page as i64;
            prop_assert!(capacity >= total);
            prop_assert!(capacity - total < per_page as i64);
        }
    }
}
