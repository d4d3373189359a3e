//! Axum authorization middleware that runs the permission evaluator per request.
//!
//! Reads the [`Identity`] inserted by an upstream authentication layer. A
//! request without one is treated as anonymous.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};

use super::evaluator::{Decision, PermissionEvaluator};
use super::models::{Identity, PrincipalId, SecurityContext};
use super::permission::PermissionEnum;
use super::policy::PolicyRegistry;
use super::store::{PrincipalStore, RoleStore};
use crate::error::{Result, ToolkitError};

// ═══════════════════════════════════════════════════════════════════════════════
// Authorization Context (extracted in handlers)
// ═══════════════════════════════════════════════════════════════════════════════

/// Proof that the request passed a permission check.
///
/// Inserted into request extensions by [`RequirePermissionService`] so
/// handlers can read the verified principal without re-evaluating.
#[derive(Debug, Clone)]
pub struct AuthorizationContext<P> {
    pub principal_id: PrincipalId,
    pub checked_permission: P,
}

#[axum::async_trait]
impl<S, P> FromRequestParts<S> for AuthorizationContext<P>
where
    S: Send + Sync,
    P: PermissionEnum,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizationContext<P>>()
            .cloned()
            .ok_or_else(|| {
                let body = serde_json::json!({
                    "success": false,
                    "error": {
                        "code": "MISSING_AUTHORIZATION_CONTEXT",
                        "message": "Authorization context not available. Ensure the permission layer is applied.",
                    }
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with permission enforcement.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/notes", post(create_note))
///     .route_layer(RequirePermissionLayer::for_policy(evaluator, &policies, "NotesWrite")?);
/// ```
#[derive(Debug)]
pub struct RequirePermissionLayer<P, PS, RS> {
    evaluator: PermissionEvaluator<P, PS, RS>,
    permission: P,
}

impl<P: Copy, PS, RS> Clone for RequirePermissionLayer<P, PS, RS> {
    fn clone(&self) -> Self {
        Self {
            evaluator: self.evaluator.clone(),
            permission: self.permission,
        }
    }
}

impl<P, PS, RS> RequirePermissionLayer<P, PS, RS>
where
    P: PermissionEnum,
    PS: PrincipalStore,
    RS: RoleStore<P>,
{
    /// Require `permission` directly.
    pub fn new(evaluator: PermissionEvaluator<P, PS, RS>, permission: P) -> Self {
        Self {
            evaluator,
            permission,
        }
    }

    /// Require the permission behind a registered policy.
    ///
    /// An unregistered policy name is a `ConfigurationError`.
    pub fn for_policy(
        evaluator: PermissionEvaluator<P, PS, RS>,
        policies: &PolicyRegistry<P>,
        policy: &str,
    ) -> Result<Self> {
        let permission = policies.requirement(policy).ok_or_else(|| {
            ToolkitError::configuration(format!("policy '{}' is not registered", policy))
        })?;
        Ok(Self::new(evaluator, permission))
    }

    pub fn permission(&self) -> P {
        self.permission
    }
}

impl<S, P: Copy, PS, RS> Layer<S> for RequirePermissionLayer<P, PS, RS> {
    type Service = RequirePermissionService<S, P, PS, RS>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            evaluator: self.evaluator.clone(),
            permission: self.permission,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces a required permission per request.
pub struct RequirePermissionService<S, P, PS, RS> {
    inner: S,
    evaluator: PermissionEvaluator<P, PS, RS>,
    permission: P,
}

impl<S: Clone, P: Copy, PS, RS> Clone for RequirePermissionService<S, P, PS, RS> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            evaluator: self.evaluator.clone(),
            permission: self.permission,
        }
    }
}

impl<S, P, PS, RS> Service<Request<Body>> for RequirePermissionService<S, P, PS, RS>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    P: PermissionEnum,
    PS: PrincipalStore + 'static,
    RS: RoleStore<P> + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let evaluator = self.evaluator.clone();
        let permission = self.permission;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let identity = request
                .extensions()
                .get::<Identity>()
                .cloned()
                .unwrap_or_default();

            // Lookups are not tied to client disconnects.
            let cancel = CancellationToken::new();

            let decision = match evaluator.evaluate(&identity, permission, &cancel).await {
                Ok(decision) => decision,
                Err(err) => return Ok(err.into_response()),
            };

            let principal_id = match (decision, identity.principal_id()) {
                (Decision::Allow, Some(id)) => PrincipalId::new(id),
                _ => {
                    return Ok(forbidden_response(&format!(
                        "You do not have permission: {}",
                        permission.name()
                    )));
                }
            };

            request.extensions_mut().insert(AuthorizationContext {
                principal_id,
                checked_permission: permission,
            });

            inner.call(request).await
        })
    }
}

/// Build a 403 Forbidden JSON response.
fn forbidden_response(message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": {
            "code": "FORBIDDEN",
            "message": message,
        }
    });
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::Role;
    use crate::rbac::store::InMemoryDirectory;
    use axum::{routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    crate::permission_enum! {
        enum Perm {
            Read,
            Write,
        }
    }

    type Dir = InMemoryDirectory<Perm>;

    fn setup() -> (Dir, PermissionEvaluator<Perm, Dir, Dir>) {
        let dir = Dir::new();
        dir.add_role(Role::new("Viewer", [Perm::Read]));
        dir.assign_role("alice", "Viewer");
        let shared = Arc::new(dir.clone());
        (dir, PermissionEvaluator::new(shared.clone(), shared))
    }

    async fn whoami(ctx: AuthorizationContext<Perm>) -> String {
        format!("{}:{}", ctx.principal_id, ctx.checked_permission)
    }

    fn app(layer: RequirePermissionLayer<Perm, Dir, Dir>) -> Router {
        Router::new().route("/", get(whoami)).route_layer(layer)
    }

    fn request(identity: Option<Identity>) -> Request<Body> {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        if let Some(identity) = identity {
            request.extensions_mut().insert(identity);
        }
        request
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let (_, evaluator) = setup();
        let response = app(RequirePermissionLayer::new(evaluator, Perm::Read))
            .oneshot(request(Some(Identity::authenticated("alice"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "alice:Read");
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let (_, evaluator) = setup();
        let response = app(RequirePermissionLayer::new(evaluator, Perm::Write))
            .oneshot(request(Some(Identity::authenticated("alice"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_anonymous_is_forbidden() {
        let (_, evaluator) = setup();
        let response = app(RequirePermissionLayer::new(evaluator, Perm::Read))
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_forbidden() {
        let (dir, evaluator) = setup();
        dir.set_offline(true);
        let response = app(RequirePermissionLayer::new(evaluator, Perm::Read))
            .oneshot(request(Some(Identity::authenticated("alice"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_for_policy() {
        let (_, evaluator) = setup();
        let policies = PolicyRegistry::<Perm>::from_permissions().unwrap();

        let layer = RequirePermissionLayer::for_policy(evaluator.clone(), &policies, "Write").unwrap();
        assert_eq!(layer.permission(), Perm::Write);

        let err = RequirePermissionLayer::for_policy(evaluator, &policies, "Admin").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigurationError);
    }
}
