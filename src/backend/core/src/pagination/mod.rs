//! Pagination utilities.
//!
//! This module provides:
//! - Page arithmetic (`skip`, `page_count`)
//! - Wire-level page request parameters
//! - The [`PaginatedData`] result type returned by paginated repository reads
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_toolkit::pagination::{math, PageRequest, PaginatedData};
//!
//! let request = PageRequest::new(3, 20);
//! let offset = math::skip(request.page, request.page_size())?; // 40
//! let page = PaginatedData::new(3, 20, 45, rows)?;                // page_count = 3
//! ```

pub mod math;
mod request;
mod response;

pub use request::PageRequest;
pub use response::PaginatedData;

/// Default page size if not specified.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Default upper bound for page sizes accepted from clients.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Minimum page number (1-indexed).
pub const MIN_PAGE_NUMBER: u64 = 1;
