//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::imputation::StrategyMap;
use crate::lab::DataLab;
use crate::training::TrainingConfig;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run a `DataLab` operation on the blocking pool
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&DataLab) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let lab = state.lab.clone();
    tokio::task::spawn_blocking(move || op(&lab))
        .await
        .map_err(|e| ServerError::Internal(format!("Worker task failed: {}", e)))?
        .map_err(ServerError::from)
}

fn to_json<T: Serialize>(value: &T) -> Result<Json<serde_json::Value>> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| ServerError::Internal(format!("Failed to encode response: {}", e)))
}

// ============================================================================
// Session creation
// ============================================================================

/// Accept a CSV upload in the multipart field `file`
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        info!(file_name = %file_name, bytes = data.len(), "Received upload");

        let response = run_blocking(&state, move |lab| lab.upload(&file_name, &data)).await?;
        return to_json(&response);
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

pub async fn use_sample(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let response = run_blocking(&state, |lab| lab.use_sample()).await?;
    to_json(&response)
}

// ============================================================================
// Exploration and cleaning
// ============================================================================

pub async fn get_eda(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let report = run_blocking(&state, move |lab| lab.eda(&session_id)).await?;
    to_json(&report)
}

pub async fn get_preview(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let preview = run_blocking(&state, move |lab| lab.preview(&session_id)).await?;
    to_json(&preview)
}

/// Body: `{"column": "mean" | "median" | "mode" | "drop_row", ...}`
pub async fn impute(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let request: IndexMap<String, serde_json::Value> = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid imputation request: {}", e)))?;
    let strategies = StrategyMap::from_json(&request)?;
    let response = run_blocking(&state, move |lab| lab.impute(&session_id, strategies)).await?;
    to_json(&response)
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let report = run_blocking(&state, move |lab| lab.compare(&session_id)).await?;
    to_json(&report)
}

// ============================================================================
// Training and export
// ============================================================================

/// Body is optional; an empty body trains Random Forest with defaults
pub async fn train(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let config: TrainingConfig = if body.iter().all(u8::is_ascii_whitespace) {
        TrainingConfig::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ServerError::BadRequest(format!("Invalid training configuration: {}", e))
        })?
    };

    let response = run_blocking(&state, move |lab| lab.train(&session_id, &config)).await?;
    to_json(&response)
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let history = run_blocking(&state, move |lab| lab.history(&session_id)).await?;
    to_json(&history)
}

pub async fn download_model(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let download = run_blocking(&state, move |lab| lab.download_model(&session_id)).await?;

    let disposition = format!("attachment; filename=\"{}\"", download.file_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .map_err(|e| ServerError::Internal(format!("Invalid header: {}", e)))?,
            ),
        ],
        download.bytes,
    ))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
