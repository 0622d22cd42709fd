//! Error types for the server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::DatalabError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Error training model: {0}")]
    Training(String),

    #[error("{0}")]
    Internal(String),

    /// Rejection produced outside a handler (extractor, middleware layer)
    #[error("{1}")]
    Rejected(StatusCode, String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Training(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Rejected(status, _) => *status,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "invalid_input",
            ServerError::NotFound(_) => "not_found",
            ServerError::PayloadTooLarge(_) => "payload_too_large",
            ServerError::Training(_) => "training_failed",
            ServerError::Internal(_) => "internal",
            ServerError::Rejected(status, _) => match *status {
                StatusCode::NOT_FOUND => "not_found",
                StatusCode::METHOD_NOT_ALLOWED => "method_not_allowed",
                StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
                s if s.is_server_error() => "internal",
                _ => "invalid_input",
            },
        }
    }

    /// Wrap a non-JSON error response's status and text
    pub fn rejection(status: StatusCode, message: String) -> Self {
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        } else {
            message
        };
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => ServerError::PayloadTooLarge(message),
            StatusCode::BAD_REQUEST => ServerError::BadRequest(message),
            _ => ServerError::Rejected(status, message),
        }
    }
}

impl From<DatalabError> for ServerError {
    fn from(err: DatalabError) -> Self {
        match err.kind() {
            "not_found" => ServerError::NotFound(err.to_string()),
            "invalid_input" => ServerError::BadRequest(err.to_string()),
            "training_failed" => ServerError::Training(err.to_string()),
            _ => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(err.body_text())
        } else {
            ServerError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match &self {
            ServerError::Training(_) => tracing::warn!(detail = %message, "Training error"),
            ServerError::Internal(_) => tracing::error!(detail = %message, "Internal server error"),
            _ => tracing::debug!(status = status.as_u16(), detail = %message, "Request rejected"),
        }

        // `detail` mirrors `message` for clients written against the old API
        let body = Json(json!({
            "error": true,
            "kind": self.kind(),
            "message": message,
            "detail": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_errors_map_to_status() {
        let cases = [
            (DatalabError::NotFound("Session not found".into()), StatusCode::NOT_FOUND),
            (DatalabError::InvalidInput("bad csv".into()), StatusCode::BAD_REQUEST),
            (DatalabError::TrainingFailed("one class".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DatalabError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn test_rejection_keeps_status() {
        let err = ServerError::rejection(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into());
        assert!(matches!(err, ServerError::PayloadTooLarge(_)));
        assert_eq!(err.kind(), "payload_too_large");

        let err = ServerError::rejection(StatusCode::UNSUPPORTED_MEDIA_TYPE, String::new());
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.to_string(), "Unsupported Media Type");
    }

    #[test]
    fn test_training_message_prefix() {
        let err = ServerError::from(DatalabError::TrainingFailed("single class".into()));
        assert_eq!(err.to_string(), "Error training model: single class");
        assert_eq!(err.kind(), "training_failed");
    }
}
