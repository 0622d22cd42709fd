//! API route definitions

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::{handlers, state::AppState, ServerConfig, ServerError};

/// Prefix the bundled frontend uses
pub const API_PREFIX: &str = "/api/datalab";

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "kind": "not_found",
            "message": "Not found. Use /health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "kind": "method_not_allowed",
            "message": "Method not allowed.",
        })),
    )
}

/// Rejection texts are one line; anything longer is cut
const REJECTION_BODY_LIMIT: usize = 16 * 1024;

/// Re-encode plain-text error responses (extractor rejections, the body
/// limit layer) as the JSON error body handlers return
async fn json_rejections(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let message = axum::body::to_bytes(response.into_body(), REJECTION_BODY_LIMIT)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    ServerError::rejection(status, message).into_response()
}

fn datalab_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(handlers::upload_dataset))
        .route("/use_sample", post(handlers::use_sample))
        .route("/eda/:session_id", get(handlers::get_eda))
        .route("/preview/:session_id", get(handlers::get_preview))
        .route("/impute/:session_id", post(handlers::impute))
        .route("/compare/:session_id", get(handlers::compare))
        .route("/train/:session_id", post(handlers::train))
        .route("/history/:session_id", get(handlers::get_history))
        .route("/download_model/:session_id", get(handlers::download_model))
}

/// Create the main application router. Every data lab route is served both
/// at the root and under [`API_PREFIX`].
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .merge(datalab_routes())
        .nest(API_PREFIX, datalab_routes())
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(middleware::from_fn(json_rejections))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
