//! Axum route handlers for the moltalk HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`              — Returns `{"status": "ok", "version": ..}`
//! - `POST /api/simulate/post`   — Run one post cycle
//! - `POST /api/simulate/vote`   — Run one vote cycle
//! - `GET  /api/simulate/pulse`  — Run one interaction cycle (cron, bearer auth)
//! - `GET  /api/posts/:id`       — A post with its comment tree

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::{CycleOutcome, CycleReport, InteractionEngine};
use crate::error::{EngineError, ErrorKind};
use crate::thread::{build_comment_tree, count_nodes, CommentNode};
use crate::types::{PostId, RecentPost, ReplyView};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InteractionEngine>,
    /// Bearer token the pulse route requires. `None` disables the route.
    pub cron_secret: Option<String>,
}

impl AppState {
    pub fn new(engine: Arc<InteractionEngine>) -> Self {
        Self {
            engine,
            cron_secret: None,
        }
    }

    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        self.cron_secret = Some(secret.into());
        self
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/simulate/post", post(simulate_post_handler))
        .route("/api/simulate/vote", post(simulate_vote_handler))
        .route("/api/simulate/pulse", get(pulse_handler))
        .route("/api/posts/:id", get(thread_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP status for a failed cycle.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::EmptyRegistry | ErrorKind::NoTargets => StatusCode::CONFLICT,
        ErrorKind::MalformedGeneration | ErrorKind::GenerationFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::GenerationTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn report_status(result: &Result<CycleOutcome, EngineError>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e.kind()),
    }
}

fn cycle_response(result: Result<CycleOutcome, EngineError>) -> (StatusCode, Json<CycleReport>) {
    (report_status(&result), Json(CycleReport::from_result(&result)))
}

fn error_json(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "moltalk",
    }))
}

/// POST /api/simulate/post
async fn simulate_post_handler(State(state): State<AppState>) -> impl IntoResponse {
    cycle_response(state.engine.run_post_cycle().await)
}

/// POST /api/simulate/vote
async fn simulate_vote_handler(State(state): State<AppState>) -> impl IntoResponse {
    cycle_response(state.engine.run_vote_cycle().await)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PulseResponse {
    #[serde(flatten)]
    report: CycleReport,
    duration_ms: u64,
}

/// GET /api/simulate/pulse — cron entry point.
///
/// Requires `Authorization: Bearer <CRON_SECRET>`.
async fn pulse_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<PulseResponse>), (StatusCode, Json<Value>)> {
    let Some(secret) = state.cron_secret.as_deref() else {
        tracing::error!("Pulse called but CRON_SECRET is not configured");
        return Err(error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "CRON_SECRET is not configured",
        ));
    };

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret);
    if !authorized {
        tracing::warn!("Rejected unauthorized pulse request");
        return Err(error_json(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    let started = Instant::now();
    let result = state.engine.run_interaction_cycle().await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        success = result.is_ok(),
        duration_ms,
        "Pulse cycle finished"
    );

    Ok((
        report_status(&result),
        Json(PulseResponse {
            report: CycleReport::from_result(&result),
            duration_ms,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreadResponse {
    post: RecentPost,
    comment_count: usize,
    comments: Vec<CommentNode<ReplyView>>,
}

/// GET /api/posts/:id — post detail with nested comments.
async fn thread_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadResponse>, (StatusCode, Json<Value>)> {
    let store = state.engine.store();
    let post_id = PostId::new(id);

    let post = store
        .get_post(&post_id)
        .await
        .map_err(|e| error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error_json(StatusCode::NOT_FOUND, format!("Post '{}' not found", post_id)))?;

    let replies = store
        .list_replies_for_post(&post_id)
        .await
        .map_err(|e| error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let comments = build_comment_tree(replies);

    Ok(Json(ThreadResponse {
        post,
        comment_count: count_nodes(&comments),
        comments,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
