use crate::config::Config;
use crate::engine::FlagEngine;
use crate::errors::AppError;
use crate::export::UploadResponse;
use crate::ingest;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Shared application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Flag engine configured with the server's payment ratio policy.
    pub engine: FlagEngine,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let engine = FlagEngine::new(config.engine.clone());
        Self { config, engine }
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and the active payment ratio policy.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "early-risk",
            "version": env!("CARGO_PKG_VERSION"),
            "payment_ratio_fill": state.engine.config().payment_ratio_fill.to_string(),
        })),
    )
}

/// POST /upload
///
/// Accepts a multipart form with a `file` field (CSV or spreadsheet), scores
/// every row and returns the dashboard projection.
///
/// # Errors
///
/// * 400 - no `file` field, empty file name, or content that is not a table.
/// * 500 - the scoring task failed.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Multipart rejected: {}", rejection);
        AppError::BadRequest("No file uploaded".to_string())
    })?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InputFormat(e.to_string()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    if file_name.trim().is_empty() {
        return Err(AppError::BadRequest("Empty file name".to_string()));
    }

    tracing::info!("POST /upload - file: {}, {} bytes", file_name, bytes.len());

    // Parsing and scoring are CPU-bound; keep them off the async workers
    let engine = state.engine.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<UploadResponse, AppError> {
        let table = ingest::read_upload(&bytes)?;
        let batch = engine.compute_flags(table);
        Ok(UploadResponse::from_batch(&batch))
    })
    .await
    .map_err(|e| AppError::Processing(e.to_string()))??;

    tracing::info!("Scored {} rows from {}", response.count, file_name);
    Ok(Json(response))
}

/// Upload routes with their body limit, before state is attached.
pub fn upload_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .route("/api/v1/upload", post(upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

/// Full application router.
///
/// With `rate_limit` set, upload routes are limited per client IP. The
/// governor needs the peer address, so the router must then be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn app(state: Arc<AppState>, rate_limit: bool) -> Result<Router, AppError> {
    let mut uploads = upload_routes(state.config.max_upload_bytes);

    if rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(state.config.rate_limit_per_second)
                .burst_size(state.config.rate_limit_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| {
                    AppError::InternalError("Invalid rate limit configuration".to_string())
                })?,
        );
        uploads = uploads.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    Ok(Router::new()
        .route("/health", get(health))
        .merge(uploads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
