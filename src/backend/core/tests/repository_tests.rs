//! Integration tests for the generic repository over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use api_toolkit::error::{ErrorCode, StoreError};
use api_toolkit::pagination::PageRequest;
use api_toolkit::permission_enum;
use api_toolkit::rbac::Role;
use api_toolkit::repository::{
    AuditStamps, Auditable, Entity, GenericRepository, InMemoryStore, Predicate, Repository,
    SortDirection, SortKey, SortOrder,
};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Utilities
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Player {
    id: u32,
    rank: u32,
    audit: AuditStamps,
}

impl Entity for Player {
    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(&mut self.audit)
    }
}

fn player(id: u32, rank: u32) -> Player {
    Player {
        id,
        rank,
        audit: AuditStamps::default(),
    }
}

type PlayerRepository = GenericRepository<Player, InMemoryStore<Player, u32>>;

/// 45 players, seeded out of rank order.
fn ranked_repository() -> PlayerRepository {
    let store = InMemoryStore::new(|p: &Player| p.id);
    store
        .seed((1..=45).rev().map(|rank| player(100 + rank, rank)))
        .unwrap();
    GenericRepository::new(Arc::new(store))
}

fn by_rank() -> SortKey<Player> {
    SortKey::by(|p: &Player| p.rank)
}

fn ranks(players: &[Player]) -> Vec<u32> {
    players.iter().map(|p| p.rank).collect()
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_ranked_pagination() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();

    let first = repo
        .get_all_paginated(by_rank(), SortDirection::Asc, PageRequest::new(1, 20), &cancel)
        .await
        .unwrap();
    assert_eq!(ranks(&first.data), (1..=20).collect::<Vec<_>>());
    assert_eq!(first.page, 1);
    assert_eq!(first.page_count, 3);
    assert_eq!(first.records_per_page, 20);
    assert_eq!(first.total_records, Some(45));

    let third = repo
        .get_all_paginated(by_rank(), SortDirection::Asc, PageRequest::new(3, 20), &cancel)
        .await
        .unwrap();
    assert_eq!(ranks(&third.data), (41..=45).collect::<Vec<_>>());
    assert!(!third.has_next());
    assert!(third.has_previous());
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let repo = ranked_repository();
    let page = repo
        .get_all_paginated(
            by_rank(),
            SortDirection::Asc,
            PageRequest::new(4, 20),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.page_count, 3);
    assert_eq!(page.total_records, Some(45));
}

#[tokio::test]
async fn test_descending_order_applies_before_slice() {
    let repo = ranked_repository();
    let page = repo
        .get_all_paginated(
            by_rank(),
            SortDirection::Desc,
            PageRequest::new(1, 5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(ranks(&page.data), vec![45, 44, 43, 42, 41]);
    assert_eq!(page.page_count, 9);
}

#[tokio::test]
async fn test_filtered_pagination() {
    let repo = ranked_repository();
    let even = Predicate::new(|p: &Player| p.rank % 2 == 0);

    let page = repo
        .find_paginated(
            even,
            PageRequest::new(2, 10),
            Some(SortOrder::desc(by_rank())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Even ranks descending: 44, 42, ..., 2. Page 2 starts at 24.
    assert_eq!(page.total_records, Some(22));
    assert_eq!(page.page_count, 3);
    assert_eq!(ranks(&page.data), vec![24, 22, 20, 18, 16, 14, 12, 10, 8, 6]);
}

#[tokio::test]
async fn test_invalid_page_fails_before_store_call() {
    let repo = ranked_repository();
    repo.store().set_offline(true);

    let err = repo
        .get_all_paginated(
            by_rank(),
            SortDirection::Asc,
            PageRequest::new(0, 20),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = repo
        .find_paginated(
            Predicate::new(|_: &Player| true),
            PageRequest::new(1, 0),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

// ============================================================================
// Lookups
// ============================================================================

#[tokio::test]
async fn test_get_all_and_find() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();

    let all = repo.get_all(by_rank(), SortDirection::Asc, &cancel).await.unwrap();
    assert_eq!(all.len(), 45);
    assert_eq!(all[0].rank, 1);

    let top = repo
        .find(Predicate::new(|p: &Player| p.rank <= 3), &cancel)
        .await
        .unwrap();
    assert_eq!(top.len(), 3);
}

#[tokio::test]
async fn test_find_single_uses_store_order() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();

    // Seeded highest rank first.
    let found = repo
        .find_single(Predicate::new(|p: &Player| p.rank > 40), &cancel)
        .await
        .unwrap();
    assert_eq!(found.map(|p| p.rank), Some(45));

    let missing = repo
        .find_single(Predicate::new(|p: &Player| p.rank > 100), &cancel)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_get_by_id() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();

    assert_eq!(repo.get_by_id(&107, &cancel).await.unwrap().map(|p| p.rank), Some(7));
    assert!(repo.get_by_id(&1, &cancel).await.unwrap().is_none());
}

#[derive(Debug, Clone)]
struct Membership {
    team: u32,
    member: u32,
}

impl Entity for Membership {}

#[tokio::test]
async fn test_composite_key_lookup() {
    let store = InMemoryStore::new(|m: &Membership| (m.team, m.member));
    store
        .seed([
            Membership { team: 1, member: 1 },
            Membership { team: 1, member: 2 },
            Membership { team: 2, member: 1 },
        ])
        .unwrap();
    let repo = GenericRepository::new(Arc::new(store));
    let cancel = CancellationToken::new();

    let found = repo.get_by_id(&(1, 2), &cancel).await.unwrap().unwrap();
    assert_eq!((found.team, found.member), (1, 2));
    assert!(repo.get_by_id(&(2, 2), &cancel).await.unwrap().is_none());
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_insert_then_update_timestamps() {
    let repo: PlayerRepository = GenericRepository::new(Arc::new(InMemoryStore::new(|p: &Player| p.id)));
    let cancel = CancellationToken::new();

    let mut p = player(1, 10);
    repo.insert_or_update(&mut p, &cancel).await.unwrap();

    let created = p.audit.created_at.unwrap();
    assert_eq!(p.audit.updated_at, Some(created));
    assert_eq!(repo.store().len(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;

    p.rank = 3;
    repo.insert_or_update(&mut p, &cancel).await.unwrap();

    assert_eq!(p.audit.created_at, Some(created));
    assert!(p.audit.updated_at.unwrap() > created);

    let stored = repo.get_by_id(&1, &cancel).await.unwrap().unwrap();
    assert_eq!(stored.rank, 3);
    assert_eq!(stored.audit, p.audit);
}

permission_enum! {
    enum Grant {
        Read,
        Write,
        Export,
    }
}

#[tokio::test]
async fn test_role_upsert_round_trip() {
    let repo: GenericRepository<Role<Grant>, InMemoryStore<Role<Grant>, String>> =
        GenericRepository::new(Arc::new(InMemoryStore::new(|r: &Role<Grant>| r.name.clone())));
    let cancel = CancellationToken::new();

    let mut role = Role::new("Editor", [Grant::Read, Grant::Read, Grant::Write]);
    repo.insert_or_update(&mut role, &cancel).await.unwrap();

    let created = role.audit.created_at.unwrap();
    assert_eq!(role.audit.updated_at, Some(created));

    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(!role.grant(Grant::Write));
    assert!(role.grant(Grant::Export));
    repo.insert_or_update(&mut role, &cancel).await.unwrap();

    let stored = repo
        .get_by_id(&"Editor".to_string(), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.audit.created_at, Some(created));
    assert!(stored.audit.updated_at.unwrap() > created);
    assert_eq!(stored.permissions.len(), 3);
    assert!(stored.has_permission(Grant::Export));
    assert_eq!(stored, role);
    assert_eq!(repo.store().len(), 1);
}

#[derive(Debug, Clone)]
struct Plain {
    id: u32,
}

impl Entity for Plain {}

#[tokio::test]
async fn test_non_auditable_entity_is_stored_untouched() {
    let repo = GenericRepository::new(Arc::new(InMemoryStore::new(|p: &Plain| p.id)));
    let cancel = CancellationToken::new();

    let mut plain = Plain { id: 9 };
    repo.insert_or_update(&mut plain, &cancel).await.unwrap();
    assert!(repo.get_by_id(&9, &cancel).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();

    let victim = repo.get_by_id(&110, &cancel).await.unwrap().unwrap();
    repo.delete(&victim, &cancel).await.unwrap();

    assert!(repo.get_by_id(&110, &cancel).await.unwrap().is_none());
    assert_eq!(repo.get_all(by_rank(), SortDirection::Asc, &cancel).await.unwrap().len(), 44);

    let err = repo.delete(&victim, &cancel).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConstraintViolation);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_store_failure_propagates() {
    let repo = ranked_repository();
    repo.store().set_offline(true);

    let err = repo
        .get_all_paginated(
            by_rank(),
            SortDirection::Asc,
            PageRequest::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    assert!(err.is_retryable());
    assert!(matches!(err.store_error(), Some(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_cancelled_operation() {
    let repo = ranked_repository();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = repo.get_by_id(&101, &cancel).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);

    let mut p = player(500, 500);
    let err = repo.insert_or_update(&mut p, &cancel).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);
}
