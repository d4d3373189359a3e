//! Lookup contracts the evaluator and bootstrap depend on, plus an
//! in-process directory implementing both.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::models::{PrincipalId, Role};
use super::permission::PermissionEnum;
use crate::error::StoreError;
use crate::repository::Auditable;

// ═══════════════════════════════════════════════════════════════════════════════
// Contracts
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves principals and the names of the roles assigned to them.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    type Principal: Send + Sync;

    /// `None` when no principal has this identity.
    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Self::Principal>, StoreError>;

    /// Role names assigned to `principal`. Names need not refer to existing roles.
    async fn role_names(
        &self,
        principal: &Self::Principal,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, StoreError>;
}

/// Resolves role definitions by name.
#[async_trait]
pub trait RoleStore<P: PermissionEnum>: Send + Sync {
    /// Roles whose names appear in `names`. Unknown names are skipped.
    async fn roles_by_names(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Role<P>>, StoreError>;

    async fn role_exists(&self, name: &str, cancel: &CancellationToken)
        -> Result<bool, StoreError>;

    /// Persist a new role. A role with the same name yields [`StoreError::Constraint`].
    async fn create_role(&self, role: Role<P>, cancel: &CancellationToken)
        -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Directory
// ═══════════════════════════════════════════════════════════════════════════════

/// Principals, role assignments and role definitions held in memory.
///
/// Thread-safe via `DashMap`. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory<P: PermissionEnum> {
    /// Role definitions indexed by name.
    roles: Arc<DashMap<String, Role<P>>>,

    /// Assigned role names per principal.
    assignments: Arc<DashMap<PrincipalId, BTreeSet<String>>>,

    offline: Arc<AtomicBool>,
}

impl<P: PermissionEnum> Default for InMemoryDirectory<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PermissionEnum> InMemoryDirectory<P> {
    pub fn new() -> Self {
        Self {
            roles: Arc::new(DashMap::new()),
            assignments: Arc::new(DashMap::new()),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a principal with no roles. Existing assignments are kept.
    pub fn add_principal(&self, id: impl Into<PrincipalId>) {
        self.assignments.entry(id.into()).or_default();
    }

    /// Assign a role name to a principal, registering the principal if needed.
    ///
    /// The role does not have to exist yet.
    pub fn assign_role(&self, id: impl Into<PrincipalId>, role_name: impl Into<String>) {
        let id = id.into();
        let role_name = role_name.into();
        debug!(principal = %id, role = %role_name, "Assigning role");
        self.assignments.entry(id).or_default().insert(role_name);
    }

    /// Returns `true` if the assignment existed.
    pub fn unassign_role(&self, id: &PrincipalId, role_name: &str) -> bool {
        self.assignments
            .get_mut(id)
            .map(|mut names| names.remove(role_name))
            .unwrap_or(false)
    }

    /// Insert or replace a role definition.
    pub fn add_role(&self, role: Role<P>) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn remove_role(&self, name: &str) -> bool {
        self.roles.remove(name).is_some()
    }

    pub fn get_role(&self, name: &str) -> Option<Role<P>> {
        self.roles.get(name).map(|r| r.clone())
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Make every subsequent lookup fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self, cancel: &CancellationToken) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("directory is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<P: PermissionEnum> PrincipalStore for InMemoryDirectory<P> {
    type Principal = PrincipalId;

    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PrincipalId>, StoreError> {
        self.check(cancel)?;
        let id = PrincipalId::new(id);
        Ok(self.assignments.contains_key(&id).then_some(id))
    }

    async fn role_names(
        &self,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, StoreError> {
        self.check(cancel)?;
        Ok(self
            .assignments
            .get(principal)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl<P: PermissionEnum> RoleStore<P> for InMemoryDirectory<P> {
    async fn roles_by_names(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Role<P>>, StoreError> {
        self.check(cancel)?;
        Ok(names
            .iter()
            .filter_map(|name| self.roles.get(name).map(|r| r.clone()))
            .collect())
    }

    async fn role_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError> {
        self.check(cancel)?;
        Ok(self.roles.contains_key(name))
    }

    async fn create_role(
        &self,
        mut role: Role<P>,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.check(cancel)?;
        match self.roles.entry(role.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::Constraint(format!(
                "role '{}' already exists",
                role.name
            ))),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                role.audit.set_created_at(now);
                role.audit.set_updated_at(now);
                slot.insert(role);
                Ok(())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
