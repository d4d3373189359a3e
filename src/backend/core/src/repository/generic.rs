//! Generic repository over any [`Store`].

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::entity::Entity;
use super::query::{OrderedQuery, SortDirection, SortOrder};
use super::store::{ChangeSet, Store};
use crate::error::Result;
use crate::pagination::{math, PageRequest, PaginatedData};

// ═══════════════════════════════════════════════════════════════════════════════
// Repository Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Data-access operations for one entity type.
///
/// Paginated reads issue two store calls (count, then slice). They observe a
/// consistent snapshot only if the store provides one; otherwise
/// `total_records` and the returned page can disagree under concurrent writes.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    type Key: Send + Sync;
    type Filter: Send + Sync;
    type OrderKey: Send + Sync;

    /// Every entity, sorted by `order_key`.
    async fn get_all(
        &self,
        order_key: Self::OrderKey,
        direction: SortDirection,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>>;

    /// One page of every entity, sorted by `order_key` before slicing.
    async fn get_all_paginated(
        &self,
        order_key: Self::OrderKey,
        direction: SortDirection,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<PaginatedData<E>>;

    /// Lookup by primary key; `None` on a miss.
    async fn get_by_id(&self, key: &Self::Key, cancel: &CancellationToken) -> Result<Option<E>>;

    /// Every entity matching `filter`, in store order.
    async fn find(&self, filter: Self::Filter, cancel: &CancellationToken) -> Result<Vec<E>>;

    /// One page of the entities matching `filter`.
    ///
    /// Without `order` the page comes back in store-default order, which the
    /// store may not keep stable across calls.
    async fn find_paginated(
        &self,
        filter: Self::Filter,
        page: PageRequest,
        order: Option<SortOrder<Self::OrderKey>>,
        cancel: &CancellationToken,
    ) -> Result<PaginatedData<E>>;

    /// First entity matching `filter` in store order.
    async fn find_single(&self, filter: Self::Filter, cancel: &CancellationToken)
        -> Result<Option<E>>;

    /// Add or update `entity`, stamp its audit timestamps, and commit.
    async fn insert_or_update(&self, entity: &mut E, cancel: &CancellationToken) -> Result<()>;

    /// Remove `entity` and commit.
    async fn delete(&self, entity: &E, cancel: &CancellationToken) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Generic Repository
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless [`Repository`] implementation delegating to a shared store.
pub struct GenericRepository<E, S> {
    store: Arc<S>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Clone for GenericRepository<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E, S> std::fmt::Debug for GenericRepository<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("entity", &std::any::type_name::<E>())
            .field("store", &std::any::type_name::<S>())
            .finish()
    }
}

impl<E, S> GenericRepository<E, S>
where
    E: Entity,
    S: Store<E>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// The underlying store, for queries the repository does not cover.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn paginate(
        &self,
        filter: Option<S::Filter>,
        order: Option<SortOrder<S::OrderKey>>,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<PaginatedData<E>> {
        let page_size = page.page_size();
        let offset = math::skip(page.page, page_size)?;

        let total = self.store.count(filter.as_ref(), cancel).await?;

        let query = OrderedQuery {
            filter,
            order,
            skip: Some(offset),
            take: Some(page_size),
        };
        let data = self.store.query(&query, cancel).await?;

        debug!(
            entity = std::any::type_name::<E>(),
            page = page.page,
            page_size,
            total_records = total,
            returned = data.len(),
            "Fetched page"
        );

        PaginatedData::new(page.page, page_size, total, data)
    }
}

fn record_operation(operation: &'static str) {
    counter!("toolkit_repository_operations_total", "operation" => operation).increment(1);
}

#[async_trait]
impl<E, S> Repository<E> for GenericRepository<E, S>
where
    E: Entity,
    S: Store<E> + 'static,
{
    type Key = S::Key;
    type Filter = S::Filter;
    type OrderKey = S::OrderKey;

    async fn get_all(
        &self,
        order_key: S::OrderKey,
        direction: SortDirection,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>> {
        record_operation("get_all");
        let query = OrderedQuery::all().order_by(order_key, direction);
        Ok(self.store.query(&query, cancel).await?)
    }

    async fn get_all_paginated(
        &self,
        order_key: S::OrderKey,
        direction: SortDirection,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<PaginatedData<E>> {
        record_operation("get_all_paginated");
        self.paginate(None, Some(SortOrder::new(order_key, direction)), page, cancel)
            .await
    }

    async fn get_by_id(&self, key: &S::Key, cancel: &CancellationToken) -> Result<Option<E>> {
        record_operation("get_by_id");
        Ok(self.store.find_by_key(key, cancel).await?)
    }

    async fn find(&self, filter: S::Filter, cancel: &CancellationToken) -> Result<Vec<E>> {
        record_operation("find");
        let query = OrderedQuery::filtered(filter);
        Ok(self.store.query(&query, cancel).await?)
    }

    async fn find_paginated(
        &self,
        filter: S::Filter,
        page: PageRequest,
        order: Option<SortOrder<S::OrderKey>>,
        cancel: &CancellationToken,
    ) -> Result<PaginatedData<E>> {
        record_operation("find_paginated");
        self.paginate(Some(filter), order, page, cancel).await
    }

    async fn find_single(
        &self,
        filter: S::Filter,
        cancel: &CancellationToken,
    ) -> Result<Option<E>> {
        record_operation("find_single");
        let query = OrderedQuery::filtered(filter).take(1);
        let mut matches = self.store.query(&query, cancel).await?;
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    async fn insert_or_update(&self, entity: &mut E, cancel: &CancellationToken) -> Result<()> {
        let tracked = self.store.is_tracked(entity, cancel).await?;
        let now = Utc::now();
        let mut changes = ChangeSet::new();

        if tracked {
            record_operation("update");
            if let Some(audit) = entity.auditable_mut() {
                audit.set_updated_at(now);
            }
            changes.update(entity.clone());
        } else {
            record_operation("insert");
            if let Some(audit) = entity.auditable_mut() {
                audit.set_created_at(now);
                audit.set_updated_at(now);
            }
            changes.add(entity.clone());
        }

        self.store.commit(changes, cancel).await?;

        debug!(
            entity = std::any::type_name::<E>(),
            inserted = !tracked,
            "Persisted entity"
        );
        Ok(())
    }

    async fn delete(&self, entity: &E, cancel: &CancellationToken) -> Result<()> {
        record_operation("delete");
        let mut changes = ChangeSet::new();
        changes.remove(entity.clone());
        self.store.commit(changes, cancel).await?;

        debug!(entity = std::any::type_name::<E>(), "Deleted entity");
        Ok(())
    }
}
