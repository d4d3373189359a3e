//! Query descriptor handed to a [`Store`](super::Store).
//!
//! The repository never evaluates filters or orderings itself; it bundles them
//! with the page window and lets the store execute the whole thing.

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortDirection {
    /// Apply this direction to an ascending comparison result.
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// An ordering key plus its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder<K> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K> SortOrder<K> {
    pub fn new(key: K, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn asc(key: K) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    pub fn desc(key: K) -> Self {
        Self::new(key, SortDirection::Desc)
    }
}

/// Filter, ordering and page window for a single store read.
///
/// Stores must apply the pieces in this order: filter, sort, skip, take.
#[derive(Debug, Clone)]
pub struct OrderedQuery<F, K> {
    pub filter: Option<F>,
    pub order: Option<SortOrder<K>>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl<F, K> Default for OrderedQuery<F, K> {
    fn default() -> Self {
        Self {
            filter: None,
            order: None,
            skip: None,
            take: None,
        }
    }
}

impl<F, K> OrderedQuery<F, K> {
    /// A query matching every record in store order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: F) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, key: K, direction: SortDirection) -> Self {
        self.order = Some(SortOrder::new(key, direction));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }
}
