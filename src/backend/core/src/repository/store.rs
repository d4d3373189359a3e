//! The persistence capability a repository is built over.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::entity::Entity;
use super::query::OrderedQuery;
use crate::error::StoreError;

// ═══════════════════════════════════════════════════════════════════════════════
// Staged Writes
// ═══════════════════════════════════════════════════════════════════════════════

/// One staged write.
#[derive(Debug, Clone)]
pub enum Change<E> {
    Add(E),
    Update(E),
    Remove(E),
}

/// Writes staged by one caller and persisted together by [`Store::commit`].
///
/// Owned by the caller, so a rejected commit never affects anyone else's
/// pending writes.
#[derive(Debug, Clone)]
pub struct ChangeSet<E> {
    changes: Vec<Change<E>>,
}

impl<E> Default for ChangeSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ChangeSet<E> {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Stage a new entity.
    pub fn add(&mut self, entity: E) -> &mut Self {
        self.changes.push(Change::Add(entity));
        self
    }

    /// Stage changes to an existing entity.
    pub fn update(&mut self, entity: E) -> &mut Self {
        self.changes.push(Change::Update(entity));
        self
    }

    /// Stage removal of an entity.
    pub fn remove(&mut self, entity: E) -> &mut Self {
        self.changes.push(Change::Remove(entity));
        self
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<E> IntoIterator for ChangeSet<E> {
    type Item = Change<E>;
    type IntoIter = std::vec::IntoIter<Change<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimal store contract for one entity type.
///
/// Writes are staged in a caller-owned [`ChangeSet`]; nothing is durable until
/// [`Store::commit`] returns. Every call receives the caller's cancellation
/// token and is expected to honor it.
#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    /// Primary key; use a tuple for composite keys.
    type Key: Send + Sync;

    /// Store-native predicate.
    type Filter: Send + Sync;

    /// Store-native ordering key.
    type OrderKey: Send + Sync;

    /// Number of committed records matching `filter` (all records when `None`).
    async fn count(
        &self,
        filter: Option<&Self::Filter>,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError>;

    /// Filter, sort, skip and take, in that order.
    async fn query(
        &self,
        query: &OrderedQuery<Self::Filter, Self::OrderKey>,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>, StoreError>;

    async fn find_by_key(
        &self,
        key: &Self::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<E>, StoreError>;

    /// Whether the store already holds an instance with this entity's identity.
    async fn is_tracked(&self, entity: &E, cancel: &CancellationToken) -> Result<bool, StoreError>;

    /// Persist `changes` durably, all or none.
    async fn commit(&self, changes: ChangeSet<E>, cancel: &CancellationToken)
        -> Result<(), StoreError>;
}
