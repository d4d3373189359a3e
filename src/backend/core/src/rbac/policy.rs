//! Named access policies derived from the permission enumeration.
//!
//! Each permission value gets one policy whose name is the value's
//! [`PermissionEnum::name`] and whose requirement is that single value.
//! The registry is built once at startup and read-only afterwards.

use metrics::counter;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::permission::PermissionEnum;
use crate::error::{Result, ToolkitError};

// ═══════════════════════════════════════════════════════════════════════════════
// Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// A single permission that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionRequirement<P> {
    pub permission: P,
}

impl<P> PermissionRequirement<P> {
    pub fn new(permission: P) -> Self {
        Self { permission }
    }
}

/// A named requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy<P> {
    pub name: String,
    pub requirement: PermissionRequirement<P>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Policies indexed by name.
#[derive(Debug, Clone)]
pub struct PolicyRegistry<P> {
    policies: BTreeMap<String, AccessPolicy<P>>,
}

impl<P: PermissionEnum> Default for PolicyRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PermissionEnum> PolicyRegistry<P> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    /// One policy per value of `P`, named by [`PermissionEnum::name`].
    pub fn from_permissions() -> Result<Self> {
        Self::from_values(P::all().iter().copied(), |p| p.name().to_string())
    }

    /// One policy per value in `values`, named by `name_of`.
    ///
    /// All names are derived and checked before anything is registered: if two
    /// distinct values map to the same name, this fails with
    /// `ConfigurationError` and no policy is created.
    pub fn from_values<I, F>(values: I, name_of: F) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        F: Fn(&P) -> String,
    {
        let mut derived: BTreeMap<String, P> = BTreeMap::new();
        for value in values {
            let name = name_of(&value);
            match derived.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(existing) if *existing.get() == value => {}
                Entry::Occupied(existing) => {
                    return Err(ToolkitError::configuration(format!(
                        "policy name '{}' derived from both {:?} and {:?}",
                        existing.key(),
                        existing.get(),
                        value
                    )));
                }
            }
        }

        let mut registry = Self::new();
        for (name, permission) in derived {
            registry.register(name, permission)?;
        }
        info!(policies = registry.len(), "Registered permission policies");
        Ok(registry)
    }

    /// [`from_permissions`](Self::from_permissions), then `configure` to add
    /// further policies under the same conflict rules.
    pub fn from_permissions_with<F>(configure: F) -> Result<Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut registry = Self::from_permissions()?;
        configure(&mut registry)?;
        Ok(registry)
    }

    /// Register `name` as requiring `permission`.
    ///
    /// Returns `Ok(false)` if an identical policy already exists. A different
    /// requirement under the same name is a `ConfigurationError`.
    pub fn register(&mut self, name: impl Into<String>, permission: P) -> Result<bool> {
        let name = name.into();
        match self.policies.entry(name) {
            Entry::Occupied(existing) if existing.get().requirement.permission == permission => {
                debug!(policy = %existing.key(), "Policy already registered");
                Ok(false)
            }
            Entry::Occupied(existing) => Err(ToolkitError::configuration(format!(
                "policy '{}' already requires {:?}, cannot require {:?}",
                existing.key(),
                existing.get().requirement.permission,
                permission
            ))),
            Entry::Vacant(slot) => {
                let name = slot.key().clone();
                debug!(policy = %name, permission = permission.name(), "Registering policy");
                slot.insert(AccessPolicy {
                    name,
                    requirement: PermissionRequirement::new(permission),
                });
                counter!("toolkit_policies_registered_total").increment(1);
                Ok(true)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&AccessPolicy<P>> {
        self.policies.get(name)
    }

    /// The permission required by policy `name`.
    pub fn requirement(&self, name: &str) -> Option<P> {
        self.policies.get(name).map(|p| p.requirement.permission)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessPolicy<P>> {
        self.policies.values()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    crate::permission_enum! {
        enum Perm {
            NotesRead,
            NotesWrite,
            UsersRead,
        }
    }

    #[test]
    fn test_one_policy_per_permission() {
        let registry = PolicyRegistry::<Perm>::from_permissions().unwrap();
        assert_eq!(registry.len(), Perm::all().len());
        for permission in Perm::all() {
            let policy = registry.get(permission.name()).unwrap();
            assert_eq!(policy.requirement.permission, *permission);
        }
        assert_eq!(registry.requirement("NotesWrite"), Some(Perm::NotesWrite));
        assert_eq!(registry.requirement("Unknown"), None);
    }

    #[test]
    fn test_collision_registers_nothing() {
        // "NotesRead" and "NotesWrite" both collapse to "Notes".
        let err = PolicyRegistry::from_values(Perm::all().iter().copied(), |p| {
            p.name().trim_end_matches("Read").trim_end_matches("Write").to_string()
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_reregistration_rules() {
        let mut registry = PolicyRegistry::<Perm>::from_permissions().unwrap();

        assert!(!registry.register("NotesRead", Perm::NotesRead).unwrap());
        assert_eq!(registry.len(), 3);

        let err = registry.register("NotesRead", Perm::UsersRead).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert_eq!(registry.requirement("NotesRead"), Some(Perm::NotesRead));
    }

    #[test]
    fn test_configure_hook() {
        let registry = PolicyRegistry::<Perm>::from_permissions_with(|r| {
            r.register("CanBrowse", Perm::NotesRead)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.requirement("CanBrowse"), Some(Perm::NotesRead));

        let err = PolicyRegistry::<Perm>::from_permissions_with(|r| {
            r.register("UsersRead", Perm::NotesWrite).map(|_| ())
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_iter_in_name_order() {
        let registry = PolicyRegistry::<Perm>::from_permissions().unwrap();
        let names: Vec<_> = registry.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["NotesRead", "NotesWrite", "UsersRead"]);
    }
}
