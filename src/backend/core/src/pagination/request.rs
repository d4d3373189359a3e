//! Page request parameters as they arrive on the wire.
//!
//! Accepts `?page=2&countPerPage=50`; both fields are optional. A missing page
//! is page 1. A missing page size resolves to the configured default in
//! [`PageRequest::validated`], or [`DEFAULT_PAGE_SIZE`](super::DEFAULT_PAGE_SIZE)
//! when used unvalidated.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{Result, ToolkitError};

/// Requested page and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u64,

    /// Records per page; `None` when the client did not say.
    #[serde(default, alias = "perPage", skip_serializing_if = "Option::is_none")]
    pub count_per_page: Option<u64>,
}

fn default_page() -> u64 {
    super::MIN_PAGE_NUMBER
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            count_per_page: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, count_per_page: u64) -> Self {
        Self {
            page,
            count_per_page: Some(count_per_page),
        }
    }

    /// Effective page size.
    pub fn page_size(&self) -> u64 {
        self.count_per_page.unwrap_or(super::DEFAULT_PAGE_SIZE)
    }

    /// Reject zero values and page sizes above `max_page_size`.
    pub fn validate(&self, max_page_size: u64) -> Result<()> {
        if self.page < super::MIN_PAGE_NUMBER {
            return Err(ToolkitError::invalid_argument("Page number must be at least 1"));
        }

        let page_size = self.page_size();
        if page_size < 1 {
            return Err(ToolkitError::invalid_argument(
                "Records per page must be at least 1",
            ));
        }

        if page_size > max_page_size {
            return Err(ToolkitError::invalid_argument(format!(
                "Records per page cannot exceed {}",
                max_page_size
            )));
        }

        Ok(())
    }

    /// Fill in the configured default page size, then validate against the
    /// configured maximum.
    pub fn validated(mut self, config: &PaginationConfig) -> Result<Self> {
        self.count_per_page.get_or_insert(config.default_page_size);
        self.validate(config.max_page_size)?;
        Ok(self)
    }

    /// Records to skip for this page.
    pub fn skip(&self) -> Result<u64> {
        super::math::skip(self.page, self.page_size())
    }
}
