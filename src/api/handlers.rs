use crate::error::ApiError;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

use super::server::ServerState;

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default)]
    pub filename: String,
}

/// Liveness target for the coordinator, answers regardless of readiness
pub async fn root_handler() -> impl IntoResponse {
    Json(["MLMicroserviceTemplate is Running!"])
}

pub async fn status_handler(State(state): State<ServerState>) -> Result<Json<Value>, ApiError> {
    if !state.readiness.is_ready() {
        return Err(ApiError::NotReady);
    }

    Ok(Json(json!({
        "status": "success",
        "detail": "Model ready to receive prediction requests.",
    })))
}

pub async fn predict_handler(
    State(state): State<ServerState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<Value>, ApiError> {
    if !state.readiness.is_ready() {
        debug!("Rejecting prediction for '{}': model not ready", query.filename);
        return Err(ApiError::ModelNotConfigured);
    }

    let path =
        resolve_image_path(&state.images_dir, &query.filename).ok_or(ApiError::FileNotFound)?;
    let mut image = open_image(&state.images_dir, &path).await.map_err(|e| {
        debug!("Unable to open image {}: {}", path.display(), e);
        ApiError::FileNotFound
    })?;

    let model = Arc::clone(&state.model);
    let prediction = tokio::task::spawn_blocking(move || model.predict(&mut image))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {}", e)))?
        .map_err(|e| {
            error!("Prediction on {} failed: {}", path.display(), e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({ "result": prediction })))
}

/// Snapshot of readiness, coordinator connection and component states
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let connection = &state.connection;

    let status = if state.readiness.is_closed() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(json!({
        "status": status,
        "ready_to_predict": state.readiness.is_ready(),
        "connection": {
            "state": connection.current(),
            "registration_attempts": connection.registration_attempts(),
            "probes_sent": connection.probes_sent(),
            "last_contact": connection.last_contact(),
        },
        "components": state.components.snapshot().await,
    }))
}

/// Resolve `filename` inside `images_dir`, refusing anything that could escape it
pub(crate) fn resolve_image_path(images_dir: &Path, filename: &str) -> Option<PathBuf> {
    if filename.is_empty() {
        return None;
    }

    let relative = Path::new(filename);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    contained.then(|| images_dir.join(relative))
}

/// Open `path` only if it resolves, symlinks included, to a regular file inside `images_dir`
async fn open_image(images_dir: &Path, path: &Path) -> io::Result<std::fs::File> {
    let root = tokio::fs::canonicalize(images_dir).await?;
    let resolved = tokio::fs::canonicalize(path).await?;
    if !resolved.starts_with(&root) {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "resolves outside the images directory",
        ));
    }

    let file = tokio::fs::File::open(&resolved).await?;
    if !file.metadata().await?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok(file.into_std().await)
}
