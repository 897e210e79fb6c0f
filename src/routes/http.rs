// GET handlers plus the config apply action

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{ApiError, AppState};
use crate::error::PupError;
use crate::patch::render;
use crate::version::{NAME, VERSION};

/// GET /version: daemon name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

pub(super) async fn list_pups(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.list_pups().await)
}

pub(super) async fn get_pup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.manager.get_pup(&id).await?))
}

pub(super) async fn dependencies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.manager.dependency_report(&id).await?))
}

/// GET /api/pups/{id}/can-start: verdict plus the flags behind it.
pub(super) async fn can_start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.manager.health(&id).await?;
    Ok(Json(serde_json::json!({
        "canStart": report.can_start(),
        "health": report,
    })))
}

pub(super) async fn list_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.list_stats().await)
}

/// POST /api/pups/{id}/apply-config: render this pup's container file plus
/// the shared firewall and container list, then apply as one patch.
pub(super) async fn apply_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(patcher) = &state.patcher else {
        return Err(PupError::Validation("config patching is disabled".into()).into());
    };
    // Resolves NotFound before a patch is opened.
    state.manager.get_pup(&id).await?;
    let records = state.manager.list_pups().await;

    let mut patch = patcher.new_patch(format!("apply-config-{id}"));
    render::stage_pup_changes(&mut patch, &records, &id)?;
    patch.apply().await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "state": patch.state(),
            "snapshot": patch.snapshot_path().map(|p| p.display().to_string()),
        })),
    ))
}
