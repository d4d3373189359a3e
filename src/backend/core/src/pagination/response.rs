//! Paginated result type.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One page of an ordered collection plus its position within the whole.
///
/// Serialized as `{ page, pageCount, recordsPerPage, totalRecords, data }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedData<T> {
    /// Current page number (1-indexed).
    pub page: u64,
    /// Total number of pages; `ceil(total_records / records_per_page)`.
    pub page_count: u64,
    /// Requested page size.
    pub records_per_page: u64,
    /// Total number of records across all pages, when known.
    pub total_records: Option<u64>,
    /// Records on this page; never more than `records_per_page`.
    pub data: Vec<T>,
}

impl<T> PaginatedData<T> {
    /// Assemble a page from a known total.
    ///
    /// `data` is truncated to `records_per_page` if the store returned more.
    pub fn new(page: u64, records_per_page: u64, total_records: u64, mut data: Vec<T>) -> Result<Self> {
        let page_count = super::math::page_count(total_records, records_per_page)?;
        data.truncate(usize::try_from(records_per_page).unwrap_or(usize::MAX));

        Ok(Self {
            page,
            page_count,
            records_per_page,
            total_records: Some(total_records),
            data,
        })
    }

    /// Number of records on this page.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether a page exists after this one.
    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    /// Whether a page exists before this one.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Map the records while keeping the page metadata.
    pub fn map<U, F>(self, f: F) -> PaginatedData<U>
    where
        F: FnMut(T) -> U,
    {
        PaginatedData {
            page: self.page,
            page_count: self.page_count,
            records_per_page: self.records_per_page,
            total_records: self.total_records,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_page_count() {
        let page = PaginatedData::new(3, 20, 45, vec![1, 2, 3, 4, 5]).unwrap();
        assert_eq!(page.page_count, 3);
        assert_eq!(page.total_records, Some(45));
        assert_eq!(page.len(), 5);
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_new_truncates_oversized_data() {
        let page = PaginatedData::new(1, 2, 10, vec![1, 2, 3]).unwrap();
        assert_eq!(page.data, vec![1, 2]);
    }

    #[test]
    fn test_new_rejects_zero_page_size() {
        assert!(PaginatedData::<u8>::new(1, 0, 10, vec![]).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let page = PaginatedData::new(1, 20, 1, vec!["a"]).unwrap();
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["page"], 1);
        assert_eq!(json["pageCount"], 1);
        assert_eq!(json["recordsPerPage"], 20);
        assert_eq!(json["totalRecords"], 1);
        assert_eq!(json["data"][0], "a");
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PaginatedData::new(2, 2, 4, vec![3, 4]).unwrap();
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.page, 2);
        assert_eq!(mapped.page_count, 2);
        assert_eq!(mapped.data, vec![30, 40]);
    }
}
