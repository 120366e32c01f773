//! JSON HTTP server over the engine's read models.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, generation, trained flag) |
//! | `POST` | `/train` | Run a training cycle on a JSON array of upload rows |
//! | `POST` | `/search` | Similar tickets for `{ "query", "limit"? }` |
//! | `GET`  | `/root-causes` | Root-cause counts |
//! | `GET`  | `/heatmap` | Category × priority grid |
//! | `GET`  | `/accuracy` | Hold-out accuracy report |
//! | `GET`  | `/keywords/{cause}` | Keywords for one root cause |
//! | `GET`  | `/sla?now=` | Top SLA breach risks at `now` (RFC 3339, default: current time) |
//! | `POST` | `/suggest` | Suggested solution for a new problem |
//!
//! Read models answer `200` with `{ "status": "ready", "value": ... }` or
//! `{ "status": "empty", "reason": "<code>" }`. Empty is a data-quality
//! state, not an error.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Upload errors use `bad_request` with the ingestion error text.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser dashboard
//! can call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use helpdesk_insight_core::aggregate::{Heatmap, KeywordCount, RootCauseAggregate};
use helpdesk_insight_core::evaluate::AccuracyReport;
use helpdesk_insight_core::models::{EmptyReason, Outcome};
use helpdesk_insight_core::oracle::{ImageAttachment, SuggestionRequest};
use helpdesk_insight_core::sla::SlaRiskEntry;

use crate::engine::{CycleSummary, Engine, SearchHit, Suggestion};
use crate::ingest::{IngestError, Row};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Build the router for `engine`.
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/train", post(handle_train))
        .route("/search", post(handle_search))
        .route("/root-causes", get(handle_root_causes))
        .route("/heatmap", get(handle_heatmap))
        .route("/accuracy", get(handle_accuracy))
        .route("/keywords/{cause}", get(handle_keywords))
        .route("/sla", get(handle_sla))
        .route("/suggest", post(handle_suggest))
        .layer(cors)
        .with_state(AppState { engine })
}

/// Serve `engine` on `[server].bind` until the process is terminated.
pub async fn run_server(engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind_addr = engine.config().server.bind.clone();
    let app = router(engine);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("Helpdesk Insight listening on http://{}", bind_addr);

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

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Io { .. } => internal(err.to_string()),
            other => bad_request(other.to_string()),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    generation: u64,
    trained: bool,
    trained_at: Option<DateTime<Utc>>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snap = state.engine.snapshot().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generation: snap.generation,
        trained: snap.is_trained(),
        trained_at: snap.trained_at,
    })
}

// ============ POST /train ============

async fn handle_train(
    State(state): State<AppState>,
    Json(rows): Json<Vec<Row>>,
) -> Result<Json<CycleSummary>, AppError> {
    let summary = state.engine.train(&rows).await?;
    Ok(Json(summary))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Outcome<Vec<SearchHit>>>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let limit = req
        .limit
        .unwrap_or(state.engine.config().engine.search_limit)
        .max(1);
    Ok(Json(state.engine.search(&req.query, limit).await))
}

// ============ Read models ============

async fn handle_root_causes(State(state): State<AppState>) -> Json<Outcome<Vec<RootCauseAggregate>>> {
    Json(state.engine.root_causes().await)
}

async fn handle_heatmap(State(state): State<AppState>) -> Json<Outcome<Heatmap>> {
    Json(state.engine.heatmap().await)
}

async fn handle_accuracy(State(state): State<AppState>) -> Json<Outcome<AccuracyReport>> {
    Json(state.engine.accuracy().await)
}

async fn handle_keywords(
    State(state): State<AppState>,
    Path(cause): Path<String>,
) -> Result<Json<Outcome<Vec<KeywordCount>>>, AppError> {
    let outcome = state.engine.keywords(&cause).await;
    if outcome.reason() == Some(EmptyReason::UnknownRootCause) {
        return Err(not_found(format!("root cause not found: {}", cause)));
    }
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct SlaQuery {
    #[serde(default)]
    now: Option<String>,
}

async fn handle_sla(
    State(state): State<AppState>,
    Query(q): Query<SlaQuery>,
) -> Result<Json<Outcome<Vec<SlaRiskEntry>>>, AppError> {
    let now = match q.now.as_deref() {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| bad_request(format!("invalid 'now' timestamp: {}", e)))?,
        None => Utc::now(),
    };
    Ok(Json(state.engine.sla_risks(now).await))
}

// ============ POST /suggest ============

#[derive(Deserialize)]
struct SuggestBody {
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    image: Option<ImageBody>,
}

#[derive(Deserialize)]
struct ImageBody {
    mime_type: String,
    /// Standard base64.
    data: String,
}

async fn handle_suggest(
    State(state): State<AppState>,
    Json(body): Json<SuggestBody>,
) -> Result<Json<Suggestion>, AppError> {
    if body.description.trim().is_empty() {
        return Err(bad_request("description must not be empty"));
    }
    let image = match &body.image {
        Some(img) => {
            if !img.mime_type.starts_with("image/") {
                return Err(bad_request(format!("unsupported image type: {}", img.mime_type)));
            }
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(img.data.as_bytes())
                .map_err(|e| bad_request(format!("invalid image data: {}", e)))?;
            Some(ImageAttachment {
                mime_type: img.mime_type.clone(),
                bytes,
            })
        }
        None => None,
    };

    let req = SuggestionRequest {
        description: &body.description,
        category: body.category.as_deref(),
        priority: body.priority.as_deref(),
        image: image.as_ref(),
    };
    Ok(Json(state.engine.suggest(&req).await))
}
