#![allow(clippy::result_large_err)]
//! # API Toolkit
//!
//! Reusable data-access and authorization building blocks for axum services.
//!
//! ## Architecture
//!
//! - **Repository**: Generic repository over a pluggable async store, with paginated reads
//! - **Pagination**: Page math, page requests and paginated responses
//! - **RBAC**: Permission enumeration, role-based evaluator, named policies and SuperAdmin bootstrap
//! - **Telemetry**: Structured logging and Prometheus metrics
//! - **Config**: Layered configuration from files and environment

pub mod config;
pub mod error;
pub mod pagination;
pub mod rbac;
pub mod repository;
pub mod telemetry;

pub use error::{ErrorCode, ErrorSeverity, Result, StoreError, ToolkitError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ToolkitConfig;
    pub use crate::error::{ErrorCode, ErrorSeverity, Result, StoreError, ToolkitError};
    pub use crate::pagination::{PageRequest, PaginatedData};
    pub use crate::rbac::{
        ensure_default_administrator_role, AccessPolicy, AuthorizationContext, Decision,
        DenyReason, Identity, InMemoryDirectory, PermissionEnum, PermissionEvaluator,
        PolicyRegistry, PrincipalId, PrincipalStore, RequirePermissionLayer, Role, RoleStore,
        SecurityContext,
    };
    pub use crate::repository::{
        AuditStamps, Auditable, Entity, GenericRepository, InMemoryStore, OrderedQuery,
        Predicate, Repository, SortDirection, SortKey, SortOrder, Store,
    };
    pub use crate::permission_enum;
}
