// HTTP + WebSocket routes over the pup manager

mod http;
mod ws;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{PatchError, PupError};
use crate::patch::Patcher;
use crate::pup_manager::PupManager;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) manager: Arc<PupManager>,
    pub(crate) patcher: Option<Patcher>,
}

pub fn app(manager: Arc<PupManager>, patcher: Option<Patcher>) -> Router {
    let state = AppState { manager, patcher };
    Router::new()
        .route("/", get(|| async { "pupd is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/pups", get(http::list_pups)) // GET /api/pups
        .route("/api/pups/{id}", get(http::get_pup)) // GET /api/pups/{id}
        .route("/api/pups/{id}/dependencies", get(http::dependencies)) // GET /api/pups/{id}/dependencies
        .route("/api/pups/{id}/can-start", get(http::can_start)) // GET /api/pups/{id}/can-start
        .route("/api/pups/{id}/apply-config", post(http::apply_config)) // POST /api/pups/{id}/apply-config
        .route("/api/stats", get(http::list_stats)) // GET /api/stats
        .route("/ws/pupdates", get(ws::ws_pupdates)) // WS /ws/pupdates
        .route("/ws/stats", get(ws::ws_stats)) // WS /ws/stats
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// JSON error body with a status derived from the domain error.
pub(crate) struct ApiError(PupError);

impl From<PupError> for ApiError {
    fn from(e: PupError) -> Self {
        Self(e)
    }
}

impl From<PatchError> for ApiError {
    fn from(e: PatchError) -> Self {
        Self(PupError::Patch(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PupError::NotFound(_) => StatusCode::NOT_FOUND,
            PupError::AlreadyExists { .. } => StatusCode::CONFLICT,
            PupError::Validation(_) => StatusCode::BAD_REQUEST,
            PupError::ResourceExhausted(_) => StatusCode::INSUFFICIENT_STORAGE,
            PupError::Patch(PatchError::AlreadyFinalized(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
