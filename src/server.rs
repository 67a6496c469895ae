//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | Answer a question from the indexed corpus |
//! | `POST` | `/api/ask-web` | Answer a question with web retrieval |
//! | `GET`  | `/api/cache/stats` | Answer cache hit/miss counters and size |
//! | `POST` | `/api/cache/clear` | Drop every cached answer |
//! | `POST` | `/api/ingest` | Start an ingestion run in the background |
//! | `GET`  | `/health` | Health check (returns version and uptime) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_relevant_info` (404),
//! `busy` (409), `processing_failed` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use corpus_qa_core::models::{Answer, CacheStats};
use corpus_qa_core::AskError;

use crate::app::App;
use crate::ingest::IngestError;

#[derive(Clone)]
struct AppState {
    app: Arc<App>,
}

/// Build the router with every route and the CORS layer.
pub fn build_router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ask", post(handle_ask))
        .route("/api/ask-web", post(handle_ask_web))
        .route("/api/cache/stats", get(handle_cache_stats))
        .route("/api/cache/clear", post(handle_cache_clear))
        .route("/api/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { app })
}

/// Serve the API on `[server].bind` until `shutdown` resolves.
pub async fn run_server(
    app: Arc<App>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let bind_addr = app.config().server.bind.clone();
    let router = build_router(app);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
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

fn busy(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "busy".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline error to a response. Processing failures only carry the
/// underlying message when `expose_detail` is set.
fn ask_error(err: AskError, expose_detail: bool) -> AppError {
    let code = err.code().to_string();
    match err {
        AskError::Validation(message) => AppError {
            status: StatusCode::BAD_REQUEST,
            code,
            message,
        },
        AskError::NoRelevantInfo => AppError {
            status: StatusCode::NOT_FOUND,
            code,
            message: "No relevant information found to answer your question.".to_string(),
        },
        AskError::Processing(source) => {
            tracing::error!(error = ?source, "failed to process question");
            let message = if expose_detail {
                format!("Failed to process your question: {:#}", source)
            } else {
                "Failed to process your question".to_string()
            };
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code,
                message,
            }
        }
    }
}

// ============ POST /api/ask, /api/ask-web ============

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    source: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached: Option<bool>,
}

impl From<Answer> for AskResponse {
    fn from(a: Answer) -> Self {
        Self {
            answer: a.answer,
            source: a.source,
            timestamp: a.timestamp.to_rfc3339(),
            cached: a.served_from_cache.then_some(true),
        }
    }
}

/// Pull a string `question` out of an arbitrary JSON body.
fn question_from(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<String, AppError> {
    let invalid = || bad_request("Invalid request. Please provide a question as a string.");
    let Json(value) = body.map_err(|_| invalid())?;
    value
        .get("question")
        .and_then(|q| q.as_str())
        .map(str::to_string)
        .ok_or_else(invalid)
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let question = question_from(body)?;
    let expose = state.app.config().server.expose_error_detail;
    let answer = state
        .app
        .answer_question(&question)
        .await
        .map_err(|e| ask_error(e, expose))?;
    Ok(Json(answer.into()))
}

async fn handle_ask_web(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let question = question_from(body)?;
    let expose = state.app.config().server.expose_error_detail;
    let answer = state
        .app
        .answer_question_from_web(&question)
        .await
        .map_err(|e| ask_error(e, expose))?;
    Ok(Json(answer.into()))
}

// ============ Cache ============

#[derive(Serialize)]
struct CacheStatsResponse {
    stats: CacheStats,
    timestamp: String,
}

async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        stats: state.app.cache_stats().await,
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
    timestamp: String,
}

async fn handle_cache_clear(State(state): State<AppState>) -> Json<MessageResponse> {
    let removed = state.app.clear_cache().await;
    tracing::info!(removed, "cache cleared via API request");
    Json(MessageResponse {
        message: "Cache cleared successfully".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// ============ POST /api/ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let ingestor = state.app.ingestor();
    if ingestor.is_running() {
        return Err(busy("An ingestion run is already in progress"));
    }

    let shutdown = state.app.shutdown_signal();
    tokio::spawn(async move {
        match ingestor.run(shutdown).await {
            Ok(_) => {}
            Err(IngestError::AlreadyRunning) => {
                tracing::info!("ingestion already in progress; request ignored");
            }
            Err(e) => tracing::error!(error = ?e, "requested ingestion failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Ingestion started".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }),
    ))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    uptime_secs: u64,
    version: String,
}

/// Used by load balancers and monitoring tools.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs: state.app.uptime().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
