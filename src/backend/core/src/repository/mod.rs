//! Generic data-access layer.
//!
//! This module provides:
//! - **Store**: the narrow persistence capability the repository is built over,
//!   committing caller-owned [`ChangeSet`]s
//! - **OrderedQuery**: filter + ordering + page window handed to the store
//! - **GenericRepository**: ordered, filtered and paginated reads plus
//!   upsert/delete with automatic audit timestamps
//! - **InMemoryStore**: an all-or-nothing committing store for tests and development
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_toolkit::repository::{
//!     GenericRepository, InMemoryStore, Predicate, Repository, SortDirection, SortKey,
//! };
//!
//! let store = Arc::new(InMemoryStore::new(|note: &Note| note.id));
//! let repo = GenericRepository::new(store);
//!
//! repo.insert_or_update(&mut note, &cancel).await?;
//!
//! let page = repo
//!     .get_all_paginated(SortKey::by(|n: &Note| n.id), SortDirection::Asc, PageRequest::new(2, 20), &cancel)
//!     .await?;
//! ```

mod entity;
mod generic;
mod memory;
mod query;
mod store;

pub use entity::{AuditStamps, Auditable, Entity};
pub use generic::{GenericRepository, Repository};
pub use memory::{InMemoryStore, Predicate, SortKey};
pub use query::{OrderedQuery, SortDirection, SortOrder};
pub use store::{Change, ChangeSet, Store};
