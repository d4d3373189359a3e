//! Page arithmetic shared by every paginated query.
//!
//! Pages are 1-indexed. Both functions reject zero inputs instead of
//! producing a wrapped or meaningless offset.

use crate::error::{Result, ToolkitError};

/// Number of records to skip before the first record of `page`.
///
/// `skip(page, page_size) = (page - 1) * page_size`
pub fn skip(page: u64, page_size: u64) -> Result<u64> {
    if page < super::MIN_PAGE_NUMBER {
        return Err(ToolkitError::invalid_argument("Page number must be at least 1"));
    }
    if page_size == 0 {
        return Err(ToolkitError::invalid_argument("Page size must be at least 1"));
    }

    (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| ToolkitError::invalid_argument("Page offset overflows"))
}

/// Number of pages needed to hold `total_records` at `page_size` per page.
///
/// Exact integer ceiling division; zero records means zero pages.
pub fn page_count(total_records: u64, page_size: u64) -> Result<u64> {
    if page_size == 0 {
        return Err(ToolkitError::invalid_argument("Page size must be at least 1"));
    }
    Ok(total_records.div_ceil(page_size))
}

/// Number of records a page will actually hold.
///
/// `min(page_size, max(0, total_records - skip))`
pub fn records_on_page(total_records: u64, page: u64, page_size: u64) -> Result<u64> {
    let offset = skip(page, page_size)?;
    Ok(total_records.saturating_sub(offset).min(page_size))
}
