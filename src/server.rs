//! HTTP API for the UI layer.
//!
//! Exposes the search surface the web client consumes: query execution,
//! typeahead suggestions, fire-and-forget sync dispatch, and a health
//! probe.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Execute a search (JSON [`SearchOptions`] body) |
//! | `GET`  | `/suggest` | Typeahead suggestions (`user_id`, `q`) |
//! | `POST` | `/sync` | Dispatch a bookmark change to the index worker |
//! | `GET`  | `/health` | Engine liveness and version |
//!
//! # Error Contract
//!
//! Error responses carry a JSON envelope:
//!
//! ```json
//! { "error": { "code": "search_unavailable", "message": "..." } }
//! ```
//!
//! Engine failures map onto the UI's three behaviors: `401 auth`
//! (re-authenticate), `503 search_unavailable` (show retry action),
//! `400 bad_request` (fix the request). A sync dispatch always answers
//! `202` — index maintenance never blocks a mutation.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::engine::{EngineError, SearchEngine};
use crate::models::{Bookmark, SearchResponse};
use crate::query::{build_query, QueryError, SearchOptions};
use crate::results::normalize;
use crate::suggest::suggestions;
use crate::sync::SyncService;
use crate::trigger::{ChangeEvent, SyncTrigger};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: Arc<dyn SearchEngine>,
    trigger: SyncTrigger,
}

/// Start the search API server. Runs until the process is terminated.
pub async fn run_server(config: &Config, engine: Arc<dyn SearchEngine>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let trigger = SyncTrigger::spawn(SyncService::new(engine.clone()));
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
        trigger,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", post(handle_search))
        .route("/suggest", get(handle_suggest))
        .route("/sync", post(handle_sync))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("MindMark search API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        bad_request(e.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Auth(_) => AppError {
                status: StatusCode::UNAUTHORIZED,
                code: "auth".to_string(),
                message: e.to_string(),
            },
            EngineError::Transient(_) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "search_unavailable".to_string(),
                message: format!("search temporarily unavailable: {}", e),
            },
            _ => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "engine_error".to_string(),
                message: e.to_string(),
            },
        }
    }
}

fn classify_anyhow(e: anyhow::Error) -> AppError {
    match e.downcast::<EngineError>() {
        Ok(engine_error) => engine_error.into(),
        Err(other) => match other.downcast::<QueryError>() {
            Ok(query_error) => query_error.into(),
            Err(other) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: other.to_string(),
            },
        },
    }
}

// ============ POST /search ============

async fn handle_search(
    State(state): State<AppState>,
    Json(options): Json<SearchOptions>,
) -> Result<Json<SearchResponse>, AppError> {
    let spec = build_query(&options, &state.config.search)?;
    let raw = state.engine.search(&spec).await?;
    Ok(Json(normalize(&raw)))
}

// ============ GET /suggest ============

#[derive(Deserialize)]
struct SuggestParams {
    user_id: String,
    q: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SuggestResponse {
    suggestions: Vec<String>,
}

async fn handle_suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponse>, AppError> {
    if params.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    let limit = params.limit.unwrap_or(5);
    let found = suggestions(
        state.engine.as_ref(),
        &state.config.search,
        &params.user_id,
        &params.q,
        limit,
    )
    .await
    .map_err(classify_anyhow)?;
    Ok(Json(SuggestResponse { suggestions: found }))
}

// ============ POST /sync ============

/// Bookmark change notification. `index` and `update` both regenerate
/// the whole document, so they share the upsert path.
#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum SyncRequest {
    Index { bookmark: Bookmark },
    Update { bookmark: Bookmark },
    Delete { id: String },
    Reindex { user_id: String, bookmarks: Vec<Bookmark> },
}

#[derive(Serialize)]
struct SyncAccepted {
    status: &'static str,
    ticket: String,
}

async fn handle_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> (StatusCode, Json<SyncAccepted>) {
    let event = match request {
        SyncRequest::Index { bookmark } | SyncRequest::Update { bookmark } => {
            ChangeEvent::Upserted(bookmark)
        }
        SyncRequest::Delete { id } => ChangeEvent::Deleted { id },
        SyncRequest::Reindex { user_id, bookmarks } => ChangeEvent::Reindex { user_id, bookmarks },
    };
    let ticket = state.trigger.dispatch(event);
    (
        StatusCode::ACCEPTED,
        Json(SyncAccepted {
            status: "accepted",
            ticket: ticket.id().to_string(),
        }),
    )
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    rebuilding: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let healthy = state.engine.health().await.unwrap_or(false);
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION").to_string(),
        rebuilding: state.trigger.is_rebuilding(),
    })
}
