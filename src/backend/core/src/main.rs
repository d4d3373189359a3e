//! Toolkit Server - demo entry point
//!
//! Serves a small notes API backed by the in-memory store and guarded by the
//! permission layer. Callers identify themselves with an `x-principal-id`
//! header; real deployments put an authentication layer there instead.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use api_toolkit::{
    config::{PaginationConfig, ToolkitConfig},
    pagination::{PageRequest, PaginatedData},
    permission_enum,
    rbac::{
        ensure_administrator_role_named, AuthorizationContext, Identity, InMemoryDirectory,
        PermissionEnum, PermissionEvaluator, PolicyRegistry, RequirePermissionLayer, Role,
    },
    repository::{
        AuditStamps, Auditable, Entity, GenericRepository, InMemoryStore, Repository,
        SortDirection, SortKey,
    },
    telemetry::{init_telemetry, metrics::MetricsRegistry},
    ToolkitError,
};

permission_enum! {
    /// Permissions understood by the notes API.
    pub enum Permission {
        NotesRead,
        NotesWrite,
        NotesDelete,
    }
}

const PRINCIPAL_HEADER: &str = "x-principal-id";

// ═══════════════════════════════════════════════════════════════════════════════
// Notes
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Note {
    id: Uuid,
    author: String,
    body: String,
    #[serde(flatten)]
    audit: AuditStamps,
}

impl Entity for Note {
    fn auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(&mut self.audit)
    }
}

#[derive(Debug, Deserialize)]
struct NewNote {
    body: String,
}

type NoteRepository = GenericRepository<Note, InMemoryStore<Note, Uuid>>;
type Directory = InMemoryDirectory<Permission>;
type Evaluator = PermissionEvaluator<Permission, Directory, Directory>;

#[derive(Clone)]
struct AppState {
    notes: NoteRepository,
    pagination: PaginationConfig,
    metrics: Arc<MetricsRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ToolkitConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        ToolkitConfig::default()
    });

    let telemetry = init_telemetry(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Toolkit Server"
    );

    // Directory and bootstrap must be ready before the listener accepts.
    let directory = Arc::new(seed_directory(&config.rbac.super_admin_role));
    let startup = CancellationToken::new();
    ensure_administrator_role_named::<Permission, _>(
        &*directory,
        &config.rbac.super_admin_role,
        &startup,
    )
    .await?;

    let policies = PolicyRegistry::<Permission>::from_permissions()?;
    let evaluator = PermissionEvaluator::new(directory.clone(), directory);

    let state = AppState {
        notes: GenericRepository::new(Arc::new(InMemoryStore::new(|note: &Note| note.id))),
        pagination: config.pagination.clone(),
        metrics: Arc::new(telemetry.metrics),
    };

    let app = build_router(state, evaluator, &policies)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

fn seed_directory(admin_role: &str) -> Directory {
    let directory = Directory::new();
    directory.add_role(Role::new("Reader", [Permission::NotesRead]));
    directory.add_role(Role::new(
        "Author",
        [Permission::NotesRead, Permission::NotesWrite],
    ));
    directory.assign_role("reader", "Reader");
    directory.assign_role("author", "Author");
    directory.assign_role("admin", admin_role);
    directory
}

fn build_router(
    state: AppState,
    evaluator: Evaluator,
    policies: &PolicyRegistry<Permission>,
) -> api_toolkit::Result<Router> {
    let guard = |permission: Permission| {
        RequirePermissionLayer::for_policy(evaluator.clone(), policies, permission.name())
    };

    let router = Router::new()
        .route(
            "/notes",
            get(list_notes)
                .route_layer(guard(Permission::NotesRead)?)
                .merge(post(create_note).route_layer(guard(Permission::NotesWrite)?)),
        )
        .route(
            "/notes/:id",
            delete(delete_note).route_layer(guard(Permission::NotesDelete)?),
        )
        .route("/metrics", get(render_metrics))
        .layer(middleware::from_fn(identify))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

/// Stand-in for an authentication layer.
async fn identify(mut request: Request, next: Next) -> Response {
    let identity = request
        .headers()
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(Identity::authenticated)
        .unwrap_or_default();
    request.extensions_mut().insert(identity);
    next.run(request).await
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn list_notes(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> api_toolkit::Result<Json<PaginatedData<Note>>> {
    let page = page.validated(&state.pagination)?;
    let newest_first = SortKey::by(|note: &Note| note.audit.created_at);

    let notes = state
        .notes
        .get_all_paginated(newest_first, SortDirection::Desc, page, &CancellationToken::new())
        .await?;
    Ok(Json(notes))
}

async fn create_note(
    State(state): State<AppState>,
    auth: AuthorizationContext<Permission>,
    Json(input): Json<NewNote>,
) -> api_toolkit::Result<(StatusCode, Json<Note>)> {
    if input.body.trim().is_empty() {
        return Err(ToolkitError::invalid_argument("Note body must not be empty"));
    }

    let mut note = Note {
        id: Uuid::new_v4(),
        author: auth.principal_id.to_string(),
        body: input.body,
        audit: AuditStamps::default(),
    };
    state
        .notes
        .insert_or_update(&mut note, &CancellationToken::new())
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> api_toolkit::Result<StatusCode> {
    let cancel = CancellationToken::new();
    let note = state
        .notes
        .get_by_id(&id, &cancel)
        .await?
        .ok_or_else(|| ToolkitError::not_found("Note", id))?;

    state.notes.delete(&note, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
