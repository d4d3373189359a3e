//! Role-based access control over a closed permission enumeration.
//!
//! This module provides:
//! - **Permissions**: [`PermissionEnum`] and the [`permission_enum!`](crate::permission_enum) macro
//! - **Models**: [`Role`], [`PrincipalId`], [`Identity`] / [`SecurityContext`]
//! - **Stores**: [`PrincipalStore`] and [`RoleStore`] contracts, [`InMemoryDirectory`]
//! - **Evaluator**: [`PermissionEvaluator`] deciding Allow / Deny with a reason
//! - **Policies**: [`PolicyRegistry`], one named policy per permission value
//! - **Bootstrap**: [`ensure_default_administrator_role`]
//! - **Authorization Middleware**: [`RequirePermissionLayer`] for axum routes
//!
//! # Usage
//!
//! ```rust,ignore
//! permission_enum! {
//!     pub enum Permission { NotesRead, NotesWrite }
//! }
//!
//! let directory = Arc::new(InMemoryDirectory::<Permission>::new());
//! ensure_default_administrator_role(&*directory, &cancel).await?;
//!
//! let evaluator = PermissionEvaluator::new(directory.clone(), directory);
//! let policies = PolicyRegistry::<Permission>::from_permissions()?;
//!
//! let app = Router::new()
//!     .route("/notes", post(create_note))
//!     .route_layer(RequirePermissionLayer::for_policy(evaluator, &policies, "NotesWrite")?);
//! ```

pub mod bootstrap;
pub mod evaluator;
pub mod middleware;
pub mod models;
pub mod permission;
pub mod policy;
pub mod store;

/// Name of the role created at startup with every permission.
pub const SUPER_ADMIN_ROLE: &str = "SuperAdmin";

pub use bootstrap::{ensure_administrator_role_named, ensure_default_administrator_role};
pub use evaluator::{Decision, DenyReason, PermissionEvaluator};
pub use middleware::{AuthorizationContext, RequirePermissionLayer, RequirePermissionService};
pub use models::{Identity, PrincipalId, Role, SecurityContext};
pub use permission::PermissionEnum;
pub use policy::{AccessPolicy, PermissionRequirement, PolicyRegistry};
pub use store::{InMemoryDirectory, PrincipalStore, RoleStore};
