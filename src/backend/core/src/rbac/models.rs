//! RBAC data models: principal identity, roles, and the security context.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::permission::PermissionEnum;
use crate::repository::{AuditStamps, Auditable, Entity};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed principal identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role<P: PermissionEnum> {
    /// Unique role name.
    pub name: String,
    /// Permissions granted by this role; duplicates collapse.
    pub permissions: HashSet<P>,
    #[serde(flatten)]
    pub audit: AuditStamps,
}

impl<P: PermissionEnum> Role<P> {
    /// Create a role with the given permissions.
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = P>) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
            audit: AuditStamps::default(),
        }
    }

    /// A role holding every value of `P`.
    pub fn with_all_permissions(name: impl Into<String>) -> Self {
        Self::new(name, P::all().iter().copied())
    }

    pub fn has_permission(&self, permission: P) -> bool {
        self.permissions.contains(&permission)
    }

    /// Returns `false` if the permission was already granted.
    pub fn grant(&mut self, permission: P) -> bool {
        self.permissions.insert(permission)
    }

    /// Returns `false` if the permission was not granted.
    pub fn revoke(&mut self, permission: P) -> bool {
        self.permissions.remove(&permission)
    }
}

impl<P: PermissionEnum> Entity for Role<P> {
    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(&mut self.audit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Security Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Supplies the caller's stable identity for the current request.
pub trait SecurityContext {
    /// The principal identifier, or `None` for anonymous callers.
    fn principal_id(&self) -> Option<&str>;
}

/// Identity established by an upstream authentication layer.
///
/// Inserted into request extensions; read by
/// [`RequirePermissionLayer`](super::RequirePermissionLayer).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    principal_id: Option<PrincipalId>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal_id: impl Into<PrincipalId>) -> Self {
        Self {
            principal_id: Some(principal_id.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal_id.is_some()
    }
}

impl SecurityContext for Identity {
    fn principal_id(&self) -> Option<&str> {
        self.principal_id.as_ref().map(PrincipalId::as_str)
    }
}

impl SecurityContext for PrincipalId {
    fn principal_id(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl<C: SecurityContext> SecurityContext for Option<C> {
    fn principal_id(&self) -> Option<&str> {
        self.as_ref().and_then(SecurityContext::principal_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
