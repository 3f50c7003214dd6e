//! Pagination window for list queries

use super::error::ExchangeError;

/// One-based page of a newest-first listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    /// Page size used by history queries when the caller supplies none
    pub const DEFAULT_SIZE: usize = 50;

    /// Create a page, rejecting a zero page number or size
    pub fn new(number: usize, size: usize) -> Result<Self, ExchangeError> {
        if number == 0 {
            return Err(ExchangeError::invalid_argument("page", "must be at least 1"));
        }
        if size == 0 {
            return Err(ExchangeError::invalid_argument("limit", "must be at least 1"));
        }
        Ok(Page { number, size })
    }

    /// Number of records skipped before this page
    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Take this page's window out of an already-ordered sequence
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset()).take(self.size).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            number: 1,
            size: Self::DEFAULT_SIZE,
        }
    }
}
