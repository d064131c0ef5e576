//! Axum HTTP server for the inference service.
//!
//! - `POST /process-image` – run the [`VisionModel`] on a frame and return
//!   its raw text.
//! - `GET /health` – fixed liveness payload.
//!
//! Requests are bounded by a body-size limit and a timeout layer; a model
//! call that outlives the timeout yields `408 Request Timeout`.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};
use vlabot_types::VlaError;

use crate::api::{
    ErrorResponse, HealthResponse, ProcessImageRequest, ProcessImageResponse,
    normalize_image_path,
};
use crate::model::{VisionModel, build_prompt};

/// Request bodies carry a path and a prompt, never image data.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

pub const DEFAULT_PORT: u16 = 5000;

/// Configuration bundle for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on one request, model call included.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            request_timeout_secs: 120,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
}

impl AppState {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }
}

/// Error reply: status plus `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse::up())
}

/// POST /process-image
pub async fn handle_process_image(
    State(state): State<AppState>,
    body: Result<Json<ProcessImageRequest>, JsonRejection>,
) -> Result<Json<ProcessImageResponse>, ApiError> {
    let Ok(Json(request)) = body else {
        return Err(ApiError::bad_request("Invalid JSON payload"));
    };

    let raw_path = request.image_path.unwrap_or_default();
    if raw_path.trim().is_empty() {
        return Err(ApiError::bad_request("Image path is required"));
    }
    let image_path = normalize_image_path(&raw_path);
    let image = Path::new(image_path);
    if !tokio::fs::try_exists(image).await.unwrap_or(false) {
        return Err(ApiError::bad_request(format!(
            "Image path does not exist: {image_path}"
        )));
    }

    let prompt = build_prompt(request.user_prompt.as_deref().unwrap_or_default());
    info!(image = %image.display(), "processing image");
    match state.model.generate(image, &prompt).await {
        Ok(commands) => Ok(Json(ProcessImageResponse { commands })),
        Err(e) => {
            warn!(error = %e, "vision model failed");
            Err(ApiError {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Error processing image: {e}"),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/process-image", post(handle_process_image))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
}

/// Serve on an already bound listener until the future is dropped.
///
/// # Errors
///
/// Returns [`VlaError::Inference`] if the server stops with an I/O error.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    config: &ServerConfig,
) -> Result<(), VlaError> {
    axum::serve(listener, router(state, config))
        .await
        .map_err(|e| VlaError::Inference(format!("server error: {e}")))
}

/// Bind `0.0.0.0:<port>` and serve.
///
/// # Errors
///
/// Returns [`VlaError::Inference`] if the port cannot be bound or the
/// server fails.
pub async fn run(config: ServerConfig, model: Arc<dyn VisionModel>) -> Result<(), VlaError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| VlaError::Inference(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, "inference service listening");
    serve(listener, AppState::new(model), &config).await
}
