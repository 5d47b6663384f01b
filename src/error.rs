// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the storage layer and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures raised by a persistent store or the storage manager.
///
/// Most public storage operations absorb these and degrade to a default
/// value or a `false` return; they only escape where an API returns
/// `Result` explicitly.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Failed to serialize value: {0}")]
    Serialize(String),

    #[error("Failed to deserialize value: {0}")]
    Deserialize(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Invalid import payload: {0}")]
    InvalidImport(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Storage(StorageError::InvalidImport(msg))
            | AppError::Storage(StorageError::InvalidValue(msg)) => {
                (StatusCode::BAD_REQUEST, "invalid_payload", Some(msg.clone()))
            }
            AppError::Storage(err @ StorageError::QuotaExceeded { .. }) => (
                StatusCode::INSUFFICIENT_STORAGE,
                "quota_exceeded",
                Some(err.to_string()),
            ),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage error");
                (StatusCode::SERVICE_UNAVAILABLE, "storage_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
