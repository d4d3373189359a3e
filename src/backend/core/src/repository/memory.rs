//! In-memory store for testing and development.
//!
//! Records keep insertion order. A commit applies its change set all or
//! none under a single lock. Sorting is stable, so ties (and unordered
//! queries) come back in insertion order.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::entity::Entity;
use super::query::OrderedQuery;
use super::store::{Change, ChangeSet, Store};
use crate::error::StoreError;

// ═══════════════════════════════════════════════════════════════════════════════
// Filter and Order Key
// ═══════════════════════════════════════════════════════════════════════════════

/// Closure-backed filter for [`InMemoryStore`].
pub struct Predicate<E>(Arc<dyn Fn(&E) -> bool + Send + Sync>);

impl<E> Predicate<E> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn matches(&self, entity: &E) -> bool {
        (self.0)(entity)
    }
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Closure-backed ascending comparator for [`InMemoryStore`].
pub struct SortKey<E>(Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>);

impl<E> SortKey<E> {
    /// Order by the value `key` extracts.
    pub fn by<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self(Arc::new(move |a, b| key(a).cmp(&key(b))))
    }

    pub fn compare(&self, a: &E, b: &E) -> Ordering {
        (self.0)(a, b)
    }
}

impl<E> Clone for SortKey<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E> fmt::Debug for SortKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SortKey(..)")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory [`Store`] keyed by a caller-supplied key extractor.
pub struct InMemoryStore<E, K> {
    key_of: Arc<dyn Fn(&E) -> K + Send + Sync>,
    rows: Mutex<Vec<(K, E)>>,
    offline: AtomicBool,
}

impl<E, K> InMemoryStore<E, K>
where
    E: Entity,
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    pub fn new<F>(key_of: F) -> Self
    where
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            key_of: Arc::new(key_of),
            rows: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Insert rows directly, without a change set.
    pub fn seed(&self, entities: impl IntoIterator<Item = E>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        for entity in entities {
            let key = (self.key_of)(&entity);
            if rows.iter().any(|(k, _)| *k == key) {
                return Err(StoreError::Constraint(format!("duplicate key {:?}", key)));
            }
            rows.push((key, entity));
        }
        Ok(())
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    fn check(&self, cancel: &CancellationToken) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl<E, K> InMemoryStore<E, K>
where
    E: Entity,
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn apply(&self, rows: &mut Vec<(K, E)>, change: Change<E>) -> Result<(), StoreError> {
        match change {
            Change::Add(entity) => {
                let key = (self.key_of)(&entity);
                if rows.iter().any(|(k, _)| *k == key) {
                    return Err(StoreError::Constraint(format!("duplicate key {:?}", key)));
                }
                rows.push((key, entity));
            }
            Change::Update(entity) => {
                let key = (self.key_of)(&entity);
                match rows.iter_mut().find(|(k, _)| *k == key) {
                    Some(row) => row.1 = entity,
                    None => {
                        return Err(StoreError::Constraint(format!("no row with key {:?}", key)));
                    }
                }
            }
            Change::Remove(entity) => {
                let key = (self.key_of)(&entity);
                match rows.iter().position(|(k, _)| *k == key) {
                    Some(index) => {
                        rows.remove(index);
                    }
                    None => {
                        return Err(StoreError::Constraint(format!("no row with key {:?}", key)));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E, K> Store<E> for InMemoryStore<E, K>
where
    E: Entity,
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    type Key = K;
    type Filter = Predicate<E>;
    type OrderKey = SortKey<E>;

    async fn count(
        &self,
        filter: Option<&Predicate<E>>,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        self.check(cancel)?;
        let count = self
            .rows
            .lock()
            .iter()
            .filter(|(_, e)| filter.map_or(true, |f| f.matches(e)))
            .count();
        Ok(count as u64)
    }

    async fn query(
        &self,
        query: &OrderedQuery<Predicate<E>, SortKey<E>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>, StoreError> {
        self.check(cancel)?;
        let mut matched: Vec<E> = self
            .rows
            .lock()
            .iter()
            .map(|(_, e)| e)
            .filter(|e| query.filter.as_ref().map_or(true, |f| f.matches(e)))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| order.direction.apply(order.key.compare(a, b)));
        }

        let skip = query.skip.map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let take = query.take.map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));

        Ok(matched.into_iter().skip(skip).take(take).collect())
    }

    async fn find_by_key(
        &self,
        key: &K,
        cancel: &CancellationToken,
    ) -> Result<Option<E>, StoreError> {
        self.check(cancel)?;
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, e)| e.clone()))
    }

    async fn is_tracked(&self, entity: &E, cancel: &CancellationToken) -> Result<bool, StoreError> {
        self.check(cancel)?;
        let key = (self.key_of)(entity);
        Ok(self.rows.lock().iter().any(|(k, _)| *k == key))
    }

    async fn commit(
        &self,
        changes: ChangeSet<E>,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.check(cancel)?;
        let mut rows = self.rows.lock();

        let mut staged = rows.clone();
        for change in changes {
            self.apply(&mut staged, change)?;
        }
        *rows = staged;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::repository::{GenericRepository, Repository};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        group: &'static str,
    }

    impl Entity for Item {}

    fn item(id: u32, group: &'static str) -> Item {
        Item { id, group }
    }

    fn store() -> InMemoryStore<Item, u32> {
        let store = InMemoryStore::new(|i: &Item| i.id);
        store
            .seed(vec![item(3, "b"), item(1, "a"), item(2, "b")])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_query_applies_filter_sort_skip_take() {
        let store = store();
        let cancel = CancellationToken::new();

        let query = OrderedQuery::filtered(Predicate::new(|i: &Item| i.group == "b"))
            .order_by(SortKey::by(|i: &Item| i.id), crate::repository::SortDirection::Asc)
            .skip(1)
            .take(5);

        let ids: Vec<u32> = store
            .query(&query, &cancel)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn test_unordered_query_keeps_insertion_order() {
        let store = store();
        let rows = store
            .query(&OrderedQuery::all(), &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<u32> = rows.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_descending_sort_is_stable_for_ties() {
        let store = store();
        let query = OrderedQuery::all().order_by(
            SortKey::by(|i: &Item| i.group),
            crate::repository::SortDirection::Desc,
        );
        let ids: Vec<u32> = store
            .query(&query, &CancellationToken::new())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_commit_applies_change_set() {
        let store = store();
        let cancel = CancellationToken::new();

        let mut changes = ChangeSet::new();
        changes.add(item(9, "c")).update(item(1, "z")).remove(item(2, "b"));
        assert!(!store.is_tracked(&item(9, "c"), &cancel).await.unwrap());

        store.commit(changes, &cancel).await.unwrap();
        let ids: Vec<u32> = store
            .query(&OrderedQuery::all(), &cancel)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 9]);
        assert_eq!(store.find_by_key(&1, &cancel).await.unwrap().unwrap().group, "z");
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = store();
        let cancel = CancellationToken::new();

        let mut changes = ChangeSet::new();
        changes.add(item(10, "c")).add(item(1, "dup"));

        let err = store.commit(changes, &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.len(), 3);
        assert!(store.find_by_key(&10, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_commit_keeps_other_callers_writes() {
        let store = Arc::new(store());
        let repo = GenericRepository::new(store.clone());
        let cancel = CancellationToken::new();

        let mut pending = ChangeSet::new();
        pending.add(item(7, "c"));

        let err = repo.delete(&item(99, "missing"), &cancel).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstraintViolation);

        store.commit(pending, &cancel).await.unwrap();
        assert!(store.find_by_key(&7, &cancel).await.unwrap().is_some());
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_of_one_row() {
        let store = Arc::new(store());
        let repo = GenericRepository::new(store.clone());
        let cancel = CancellationToken::new();
        let target = item(3, "b");

        let (first, second) = tokio::join!(repo.delete(&target, &cancel), repo.delete(&target, &cancel));
        assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
        assert!(store.find_by_key(&3, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let store = store();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store.count(None, &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_offline_store_reports_unavailable() {
        let store = store();
        store.set_offline(true);

        let err = store
            .find_by_key(&1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_seed_rejects_duplicates() {
        let store = store();
        assert!(store.seed(vec![item(2, "x")]).is_err());
    }
}
