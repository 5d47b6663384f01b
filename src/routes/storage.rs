// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw key-value routes for the dev dashboard and tooling.

use crate::error::{AppError, Result, StorageError};
use crate::models::{ExportPayload, WriteReport};
use crate::services::StorageInfo;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Storage routes (require the admin token).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/storage/info", get(get_info))
        .route(
            "/api/storage/keys/{key}",
            get(get_key).put(put_key).delete(delete_key),
        )
        .route("/api/storage/export", get(export_data))
        .route("/api/storage/import", post(import_data))
        .route("/api/storage/cache/sweep", post(sweep_cache))
}

#[derive(Debug, Deserialize, Validate)]
struct KeyPath {
    #[validate(length(min = 1, max = 128))]
    key: String,
}

impl KeyPath {
    fn validated(self) -> Result<String> {
        self.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid key: {e}")))?;
        Ok(self.key)
    }
}

async fn get_info(State(state): State<Arc<AppState>>) -> Json<StorageInfo> {
    Json(state.storage.info())
}

// ─── Keys ────────────────────────────────────────────────────

async fn get_key(
    State(state): State<Arc<AppState>>,
    Path(path): Path<KeyPath>,
) -> Result<Json<Value>> {
    let key = path.validated()?;
    state
        .storage
        .get_value(&key)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Key {key} not found")))
}

async fn put_key(
    State(state): State<Arc<AppState>>,
    Path(path): Path<KeyPath>,
    Json(value): Json<Value>,
) -> Result<StatusCode> {
    let key = path.validated()?;
    if !state.storage.set_value(&key, value) {
        return Err(StorageError::Unavailable(format!("Write to {key} failed")).into());
    }
    tracing::info!(key = %key, "Key written via API");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_key(
    State(state): State<Arc<AppState>>,
    Path(path): Path<KeyPath>,
) -> Result<StatusCode> {
    let key = path.validated()?;
    if !state.storage.remove(&key) {
        return Err(StorageError::Unavailable(format!("Removal of {key} failed")).into());
    }
    tracing::info!(key = %key, "Key removed via API");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Export / Import ─────────────────────────────────────────

async fn export_data(State(state): State<Arc<AppState>>) -> Json<ExportPayload> {
    Json(state.storage.export_user_data())
}

async fn import_data(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<WriteReport>> {
    let report = state.storage.import_user_data(&payload)?;
    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "Import applied"
    );
    Ok(Json(report))
}

// ─── Cache ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SweepResponse {
    pub removed: usize,
}

async fn sweep_cache(State(state): State<Arc<AppState>>) -> Json<SweepResponse> {
    Json(SweepResponse {
        removed: state.storage.clear_expired_cache(),
    })
}
