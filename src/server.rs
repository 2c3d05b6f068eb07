//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/search` | Find or generate the page for a query |
//! | `GET`  | `/api/pages/{id}` | Page with its ordered search results |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! Every `/api` response carries `success`. Failures look like:
//!
//! ```json
//! { "success": false, "message": "Query must be between 2 and 500 characters" }
//! ```
//!
//! Status codes: 200 (existing or similar page), 201 (new page), 400
//! (invalid query), 404 (unknown page id), 500 (aggregation, generation or
//! persistence failure, or an unexpected error).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::aggregate::create_aggregator;
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db;
use crate::error::SearchError;
use crate::generate::create_generator;
use crate::get::{format_ts_iso, get_page};
use crate::migrate;
use crate::orchestrator::{OrchestratorSettings, SearchOrchestrator, SearchOutcome};
use crate::query::MSG_QUERY_REQUIRED;
use crate::store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<SearchOrchestrator>,
}

/// Builds the production orchestrator: SQLite store, configured
/// collaborators and a process-local cache.
pub async fn build_orchestrator(config: &Config) -> anyhow::Result<SearchOrchestrator> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let aggregator = create_aggregator(&config.aggregation)?;
    let generator = create_generator(&config.generation)?;

    Ok(SearchOrchestrator::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::from(aggregator),
        Arc::from(generator),
        Arc::new(MemoryCache::new()),
        OrchestratorSettings::from_config(config),
    ))
}

/// Starts the HTTP server on `[server].bind` with collaborators built from config.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    run_server_with(&config.server.bind, Arc::new(orchestrator)).await
}

/// Starts the HTTP server around an already-built orchestrator.
///
/// Used by tests and embedders that supply their own store or collaborators.
pub async fn run_server_with(bind: &str, orchestrator: Arc<SearchOrchestrator>) -> anyhow::Result<()> {
    let app = router(orchestrator);

    info!(bind, "pagesmith listening");
    println!("Pagesmith listening on http://{}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(orchestrator: Arc<SearchOrchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", post(handle_search))
        .route("/api/pages/{id}", get(handle_get_page))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { orchestrator })
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidInput(msg) => bad_request(msg),
            SearchError::AggregationFailed(msg)
            | SearchError::GenerationFailed(msg)
            | SearchError::PersistenceFailed(msg) => internal(msg),
            SearchError::Unexpected(e) => {
                error!(error = ?e, "search failed unexpectedly");
                internal("Server error")
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
}

/// Status and JSON body for a successful search.
pub fn outcome_response(outcome: &SearchOutcome) -> (StatusCode, Value) {
    match outcome {
        SearchOutcome::Existing(page) => (
            StatusCode::OK,
            json!({
                "success": true,
                "exists": true,
                "page_id": page.id,
                "is_new": false,
                "message": "Found existing page",
                "metadata": {
                    "views": page.view_count,
                    "relevance": page.relevance_score,
                    "updated": format_ts_iso(page.last_scan_date),
                },
            }),
        ),
        SearchOutcome::Similar(page) => (
            StatusCode::OK,
            json!({
                "success": true,
                "exists": true,
                "page_id": page.id,
                "is_similar": true,
                "is_new": false,
                "message": "Found similar page",
            }),
        ),
        SearchOutcome::Created(created) => (
            StatusCode::CREATED,
            json!({
                "success": true,
                "exists": false,
                "is_new": true,
                "page_id": created.page_id,
                "message": "Page generated successfully",
                "metadata": {
                    "sources_count": created.sources_count,
                    "generated_by": "AI",
                    "title": created.title,
                },
            }),
        ),
    }
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let query = match payload {
        Ok(Json(SearchRequest { query: Some(q) })) => q,
        _ => return Err(bad_request(MSG_QUERY_REQUIRED)),
    };

    let outcome = state.orchestrator.search(&query).await?;
    let (status, body) = outcome_response(&outcome);
    Ok((status, Json(body)))
}

// ============ GET /api/pages/{id} ============

async fn handle_get_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let page = get_page(state.orchestrator.store().as_ref(), id)
        .await
        .map_err(|e| {
            error!(page_id = id, error = ?e, "page lookup failed");
            internal("Server error")
        })?
        .ok_or_else(|| not_found("Page not found"))?;

    Ok(Json(json!({ "success": true, "page": page })))
}
