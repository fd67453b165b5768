use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use film_layout::project::NewPiece;
use film_layout::selector::ScoreStrategy;
use film_layout::store::ProjectId;
use film_layout::{
    CuttingProject, LayoutConfig, LayoutError, LayoutResult, PieceInstance, PiecePatch, PieceSpec,
    Placement, ProjectStore, Roll, SpecId,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
struct AppState {
    store: Arc<ProjectStore>,
}

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    roll: Roll,
    pieces: Vec<NewPiece>,
    #[serde(default = "default_true")]
    allow_rotate: bool,
    #[serde(default)]
    strategy: ScoreStrategy,
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    roll: Roll,
    #[serde(default = "default_true")]
    allow_rotate: bool,
}

#[derive(Deserialize)]
struct ToggleRequest {
    #[serde(default)]
    positions: Vec<Placement>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct ProjectCreated {
    id: ProjectId,
    layout: LayoutResult,
}

#[derive(Serialize)]
struct ProjectView {
    id: ProjectId,
    roll: Roll,
    allow_rotation: bool,
    specs: Vec<PieceSpec>,
    instances: Vec<PieceInstance>,
}

#[derive(Serialize)]
struct PiecesAdded {
    spec_ids: Vec<SpecId>,
    layout: LayoutResult,
}

#[derive(Serialize)]
struct CompletionToggled {
    completed: bool,
    layout: LayoutResult,
}

fn reject(err: LayoutError) -> ApiError {
    let status = match err {
        LayoutError::InvalidRollDimensions { .. }
        | LayoutError::InvalidPieceDimensions { .. }
        | LayoutError::MissingFixedPosition(_)
        | LayoutError::FixedPositionMismatch(_)
        | LayoutError::UnusedFixedPositions(_) => StatusCode::BAD_REQUEST,
        LayoutError::UnknownPiece(_) | LayoutError::UnknownProject(_) => StatusCode::NOT_FOUND,
        LayoutError::OverlappingFixedPieces { .. }
        | LayoutError::FixedPieceOutOfBounds(_)
        | LayoutError::CompletedPieceLocked(_) => StatusCode::CONFLICT,
        LayoutError::TooManyPieces { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    tracing::warn!(%status, error = %err, "request rejected");
    (status, err.to_string())
}

/// Optimization is CPU-bound and may wait on a project lock, so it runs off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> film_layout::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(reject)
}

async fn optimize(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> ApiResult<LayoutResult> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );
    let config = LayoutConfig {
        strategy: req.strategy,
        ..state.store.config()
    };
    let layout = run_blocking(move || {
        let mut project = CuttingProject::new(req.roll, req.allow_rotate, config)?;
        project.add_pieces(req.pieces)?;
        Ok(project.layout().clone())
    })
    .await?;
    Ok(Json(layout))
}

async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectCreated>), ApiError> {
    let id = state.store.create(req.roll, req.allow_rotate).map_err(reject)?;
    let layout = state.store.layout(id).map_err(reject)?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectCreated {
            id,
            layout: Arc::unwrap_or_clone(layout),
        }),
    ))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Result<StatusCode, ApiError> {
    state.store.remove_project(id).map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn show_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> ApiResult<ProjectView> {
    let handle = state.store.get(id).map_err(reject)?;
    let view = run_blocking(move || {
        Ok(handle.inspect(|p| ProjectView {
            id,
            roll: p.roll(),
            allow_rotation: p.allow_rotation(),
            specs: p.specs().to_vec(),
            instances: p.instances().to_vec(),
        }))
    })
    .await?;
    Ok(Json(view))
}

async fn show_layout(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> ApiResult<LayoutResult> {
    let layout = state.store.layout(id).map_err(reject)?;
    Ok(Json(Arc::unwrap_or_clone(layout)))
}

async fn add_pieces(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(pieces): Json<Vec<NewPiece>>,
) -> ApiResult<PiecesAdded> {
    let (spec_ids, layout) =
        run_blocking(move || state.store.mutate(id, |p| p.add_pieces(pieces))).await?;
    Ok(Json(PiecesAdded {
        spec_ids,
        layout: Arc::unwrap_or_clone(layout),
    }))
}

async fn update_piece(
    State(state): State<AppState>,
    Path((id, spec)): Path<(ProjectId, u64)>,
    Json(patch): Json<PiecePatch>,
) -> ApiResult<LayoutResult> {
    let ((), layout) =
        run_blocking(move || state.store.mutate(id, |p| p.update_piece(SpecId(spec), patch)))
            .await?;
    Ok(Json(Arc::unwrap_or_clone(layout)))
}

async fn toggle_complete(
    State(state): State<AppState>,
    Path((id, spec)): Path<(ProjectId, u64)>,
    Json(req): Json<ToggleRequest>,
) -> ApiResult<CompletionToggled> {
    let (completed, layout) = run_blocking(move || {
        state
            .store
            .mutate(id, |p| p.toggle_complete(SpecId(spec), &req.positions))
    })
    .await?;
    Ok(Json(CompletionToggled {
        completed,
        layout: Arc::unwrap_or_clone(layout),
    }))
}

async fn remove_piece(
    State(state): State<AppState>,
    Path((id, spec)): Path<(ProjectId, u64)>,
) -> ApiResult<LayoutResult> {
    let (_, layout) =
        run_blocking(move || state.store.mutate(id, |p| p.remove_piece(SpecId(spec)))).await?;
    Ok(Json(Arc::unwrap_or_clone(layout)))
}

fn layout_config_from_env() -> LayoutConfig {
    let mut config = LayoutConfig::default();
    if let Ok(raw) = std::env::var("MAX_PENDING_PIECES") {
        match raw.parse() {
            Ok(max_pending) => config.max_pending = max_pending,
            Err(_) => tracing::warn!(value = %raw, "ignoring invalid MAX_PENDING_PIECES"),
        }
    }
    config
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = layout_config_from_env();
    tracing::info!(max_pending = config.max_pending, "layout config loaded");
    let state = AppState {
        store: Arc::new(ProjectStore::new(config)),
    };

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .route("/projects", post(create_project))
        .route("/projects/{id}", get(show_project).delete(delete_project))
        .route("/projects/{id}/layout", get(show_layout))
        .route("/projects/{id}/pieces", post(add_pieces))
        .route(
            "/projects/{id}/pieces/{spec}",
            patch(update_piece).delete(remove_piece),
        )
        .route("/projects/{id}/pieces/{spec}/complete", post(toggle_complete))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
