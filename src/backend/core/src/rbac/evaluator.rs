//! Per-request permission evaluation.
//!
//! Every call re-resolves the principal and its roles. Nothing is cached, so
//! role changes take effect on the next request.

use metrics::counter;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::models::SecurityContext;
use super::permission::PermissionEnum;
use super::store::{PrincipalStore, RoleStore};
use crate::error::{Result, ToolkitError};

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// The context carries no principal identity.
    NoIdentity,
    /// The identity does not resolve to a known principal.
    UnknownPrincipal,
    /// None of the principal's roles grants the permission.
    PermissionNotGranted,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoIdentity => "no_identity",
            Self::UnknownPrincipal => "unknown_principal",
            Self::PermissionNotGranted => "permission_not_granted",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(*reason),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluator
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether the caller holds a permission through any of its roles.
pub struct PermissionEvaluator<P, PS, RS> {
    principals: Arc<PS>,
    roles: Arc<RS>,
    _permission: PhantomData<fn() -> P>,
}

impl<P, PS, RS> Clone for PermissionEvaluator<P, PS, RS> {
    fn clone(&self) -> Self {
        Self {
            principals: self.principals.clone(),
            roles: self.roles.clone(),
            _permission: PhantomData,
        }
    }
}

impl<P, PS, RS> fmt::Debug for PermissionEvaluator<P, PS, RS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionEvaluator")
            .field("permission", &std::any::type_name::<P>())
            .finish_non_exhaustive()
    }
}

impl<P, PS, RS> PermissionEvaluator<P, PS, RS>
where
    P: PermissionEnum,
    PS: PrincipalStore,
    RS: RoleStore<P>,
{
    pub fn new(principals: Arc<PS>, roles: Arc<RS>) -> Self {
        Self {
            principals,
            roles,
            _permission: PhantomData,
        }
    }

    /// Union of the permissions granted by the caller's roles.
    ///
    /// `Err(reason)` inside `Ok` when the caller cannot be resolved to a principal.
    async fn resolve<C>(
        &self,
        context: &C,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<HashSet<P>, DenyReason>>
    where
        C: SecurityContext + ?Sized + Sync,
    {
        let Some(id) = context.principal_id() else {
            return Ok(Err(DenyReason::NoIdentity));
        };

        let Some(principal) = self.principals.find_by_id(id, cancel).await? else {
            return Ok(Err(DenyReason::UnknownPrincipal));
        };

        let names = self.principals.role_names(&principal, cancel).await?;
        let roles = self.roles.roles_by_names(&names, cancel).await?;

        let granted = roles
            .into_iter()
            .flat_map(|role| role.permissions.into_iter())
            .collect::<HashSet<P>>();

        debug!(
            principal = id,
            assigned_roles = names.len(),
            permissions = granted.len(),
            "Resolved effective permissions"
        );
        Ok(Ok(granted))
    }

    /// Decide whether the caller holds `required`.
    ///
    /// Collaborator failures surface as `Err`, never as a deny.
    pub async fn evaluate<C>(
        &self,
        context: &C,
        required: P,
        cancel: &CancellationToken,
    ) -> Result<Decision>
    where
        C: SecurityContext + ?Sized + Sync,
    {
        let decision = match self.resolve(context, cancel).await? {
            Ok(granted) if granted.contains(&required) => Decision::Allow,
            Ok(_) => Decision::Deny(DenyReason::PermissionNotGranted),
            Err(reason) => Decision::Deny(reason),
        };

        record_decision(required, &decision);
        match decision {
            Decision::Allow => debug!(
                principal = context.principal_id().unwrap_or("-"),
                permission = required.name(),
                "Permission granted"
            ),
            Decision::Deny(reason) => warn!(
                principal = context.principal_id().unwrap_or("-"),
                permission = required.name(),
                reason = %reason,
                "Permission denied"
            ),
        }
        Ok(decision)
    }

    /// The caller's effective permissions, or `None` if it has no resolvable principal.
    pub async fn effective_permissions<C>(
        &self,
        context: &C,
        cancel: &CancellationToken,
    ) -> Result<Option<HashSet<P>>>
    where
        C: SecurityContext + ?Sized + Sync,
    {
        Ok(self.resolve(context, cancel).await?.ok())
    }

    /// Like [`evaluate`](Self::evaluate), but a deny becomes a `Forbidden` error.
    pub async fn authorize<C>(
        &self,
        context: &C,
        required: P,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        C: SecurityContext + ?Sized + Sync,
    {
        match self.evaluate(context, required, cancel).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(ToolkitError::forbidden(format!(
                "Missing permission: {}",
                required.name()
            ))
            .with_internal_message(format!("deny reason: {}", reason))),
        }
    }
}

fn record_decision<P: PermissionEnum>(permission: P, decision: &Decision) {
    let (outcome, reason) = match decision {
        Decision::Allow => ("allow", "none"),
        Decision::Deny(reason) => ("deny", reason.as_str()),
    };
    counter!(
        "toolkit_authorization_decisions_total",
        "permission" => permission.name(),
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::models::{Identity, Role};
    use crate::rbac::store::InMemoryDirectory;

    crate::permission_enum! {
        enum Perm {
            Read,
            Write,
            Delete,
        }
    }

    fn setup() -> (
        InMemoryDirectory<Perm>,
        PermissionEvaluator<Perm, InMemoryDirectory<Perm>, InMemoryDirectory<Perm>>,
    ) {
        let dir = InMemoryDirectory::new();
        dir.add_role(Role::new("Viewer", [Perm::Read]));
        dir.add_role(Role::new("Editor", [Perm::Write]));
        let shared = Arc::new(dir.clone());
        (dir, PermissionEvaluator::new(shared.clone(), shared))
    }

    #[tokio::test]
    async fn test_anonymous_is_no_identity() {
        let (_, evaluator) = setup();
        let decision = evaluator
            .evaluate(&Identity::anonymous(), Perm::Read, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NoIdentity));
    }

    #[tokio::test]
    async fn test_unregistered_is_unknown_principal() {
        let (_, evaluator) = setup();
        let decision = evaluator
            .evaluate(&Identity::authenticated("ghost"), Perm::Read, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::UnknownPrincipal));
    }

    #[tokio::test]
    async fn test_union_of_roles() {
        let (dir, evaluator) = setup();
        let cancel = CancellationToken::new();
        dir.assign_role("alice", "Viewer");
        dir.assign_role("alice", "Editor");
        let alice = Identity::authenticated("alice");

        assert!(evaluator.evaluate(&alice, Perm::Read, &cancel).await.unwrap().is_allowed());
        assert!(evaluator.evaluate(&alice, Perm::Write, &cancel).await.unwrap().is_allowed());
        assert_eq!(
            evaluator.evaluate(&alice, Perm::Delete, &cancel).await.unwrap(),
            Decision::Deny(DenyReason::PermissionNotGranted)
        );

        let granted = evaluator
            .effective_permissions(&alice, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(granted, HashSet::from([Perm::Read, Perm::Write]));
    }

    #[tokio::test]
    async fn test_role_changes_apply_immediately() {
        let (dir, evaluator) = setup();
        let cancel = CancellationToken::new();
        dir.add_principal("bob");
        let bob = Identity::authenticated("bob");

        assert!(evaluator.evaluate(&bob, Perm::Read, &cancel).await.unwrap().is_denied());
        dir.assign_role("bob", "Viewer");
        assert!(evaluator.evaluate(&bob, Perm::Read, &cancel).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_store_failure_is_error_not_deny() {
        let (dir, evaluator) = setup();
        dir.assign_role("alice", "Viewer");
        dir.set_offline(true);

        let err = evaluator
            .evaluate(&Identity::authenticated("alice"), Perm::Read, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_authorize_maps_deny_to_forbidden() {
        let (_, evaluator) = setup();
        let err = evaluator
            .authorize(&Identity::anonymous(), Perm::Write, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert!(err.user_message().contains("Write"));
    }
}
