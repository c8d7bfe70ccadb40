//! HTTP routing layer for the ingest and export flows.
//!
//! # Routes
//! - `GET /health` - liveness probe
//! - `POST /api/v0/prices` - ingest an archive, respond with statistics
//! - `GET /api/v0/prices` - export the store as an archive
//!
//! Pipeline calls are synchronous (SQLite + in-memory archives) and run on
//! the blocking pool; the request body is fully buffered before that.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::archive::ArchiveLayout;
use crate::config::Config;
use crate::db::PriceStore;
use crate::error::PipelineError;
use crate::export::export_archive;
use crate::ingest::ingest_archive;
use crate::record::PriceStats;

/// Multipart field that carries the archive.
pub const UPLOAD_FIELD: &str = "file";

/// File name offered to clients downloading an export.
pub const DOWNLOAD_NAME: &str = "data.zip";

// ============================================================================
// STATE
// ============================================================================

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PriceStore>,
    pub layout: Arc<ArchiveLayout>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn PriceStore>, config: &Config) -> Self {
        AppState {
            store,
            layout: Arc::new(config.archive_layout()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The request itself could not be read as an upload.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A blocking worker panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Self::Pipeline(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.code()),
            Self::Pipeline(err) => {
                tracing::error!(error = %err, "pipeline fault");
                (StatusCode::INTERNAL_SERVER_ERROR, err.code())
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v0/prices", get(download_prices).post(upload_prices))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/v0/prices - ingest one archive
///
/// Accepts `multipart/form-data` with the archive in field `file`, or the raw
/// archive as the whole body.
pub async fn upload_prices(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<PriceStats>, ApiError> {
    let bytes = read_upload(&state, request).await?;

    let store = Arc::clone(&state.store);
    let layout = Arc::clone(&state.layout);
    let commit = tokio::task::spawn_blocking(move || {
        ingest_archive(store.as_ref(), &bytes, &layout)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(commit.stats))
}

/// GET /api/v0/prices - export the whole store
pub async fn download_prices(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = Arc::clone(&state.store);
    let layout = Arc::clone(&state.layout);
    let artifact = tokio::task::spawn_blocking(move || export_archive(store.as_ref(), &layout))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
        ),
        (header::ETAG, format!("\"{}\"", artifact.digest)),
    ];

    Ok((headers, artifact.archive).into_response())
}

async fn read_upload(state: &AppState, request: Request) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        return axum::body::to_bytes(request.into_body(), state.max_upload_bytes)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {}", e)));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()));
        }
    }

    Err(ApiError::BadRequest(format!(
        "multipart form has no {:?} field",
        UPLOAD_FIELD
    )))
}
