//! Startup creation of the all-permissions administrator role.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::models::Role;
use super::permission::PermissionEnum;
use super::store::RoleStore;
use super::SUPER_ADMIN_ROLE;
use crate::error::{Result, StoreError, ToolkitError};

/// Create the [`SUPER_ADMIN_ROLE`] role holding every value of `P` if it does
/// not exist yet.
///
/// Returns `true` if the role was created. Await this once before serving.
pub async fn ensure_default_administrator_role<P, RS>(
    roles: &RS,
    cancel: &CancellationToken,
) -> Result<bool>
where
    P: PermissionEnum,
    RS: RoleStore<P> + ?Sized,
{
    ensure_administrator_role_named(roles, SUPER_ADMIN_ROLE, cancel).await
}

/// Same as [`ensure_default_administrator_role`] with a configured role name.
///
/// An existing role of that name is left untouched, whatever it grants.
pub async fn ensure_administrator_role_named<P, RS>(
    roles: &RS,
    name: &str,
    cancel: &CancellationToken,
) -> Result<bool>
where
    P: PermissionEnum,
    RS: RoleStore<P> + ?Sized,
{
    let exists = roles
        .role_exists(name, cancel)
        .await
        .map_err(|e| bootstrap_failure(name, e))?;
    if exists {
        debug!(role = name, "Administrator role already present");
        return Ok(false);
    }

    let role = Role::<P>::with_all_permissions(name);
    let granted = role.permissions.len();
    roles
        .create_role(role, cancel)
        .await
        .map_err(|e| bootstrap_failure(name, e))?;

    info!(role = name, permissions = granted, "Created administrator role");
    Ok(true)
}

fn bootstrap_failure(name: &str, error: StoreError) -> ToolkitError {
    ToolkitError::configuration(format!("failed to ensure administrator role '{}'", name))
        .with_source(error)
}
