// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed routes over the user-scoped keys.

use crate::error::{AppError, Result, StorageError};
use crate::models::{GamificationState, Preferences, Session, UserProfile, UserType, WriteReport};
use crate::AppState;
use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user", get(get_user))
        .route("/api/user/type", put(put_user_type))
        .route("/api/user/data", delete(clear_user_data))
}

/// Everything the app knows about the current user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStateResponse {
    pub user_type: UserType,
    pub profile: Option<UserProfile>,
    pub preferences: Preferences,
    pub gamification: Option<GamificationState>,
    pub session: Option<Session>,
}

async fn get_user(State(state): State<Arc<AppState>>) -> Json<UserStateResponse> {
    let storage = &state.storage;
    Json(UserStateResponse {
        user_type: storage.get_user_type(),
        profile: storage.get_user_profile(),
        preferences: storage.get_preferences(),
        gamification: storage.get_gamification(),
        session: storage.get_session(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserTypeRequest {
    user_type: String,
}

async fn put_user_type(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UserTypeRequest>,
) -> Result<Json<UserStateResponse>> {
    let user_type: UserType = request.user_type.parse()?;
    if !state.storage.set_user_type(user_type) {
        return Err(StorageError::Unavailable("Failed to store user type".to_string()).into());
    }
    tracing::info!(user_type = %user_type, "User type changed");
    Ok(get_user(State(state)).await)
}

async fn clear_user_data(State(state): State<Arc<AppState>>) -> Result<Json<WriteReport>> {
    let report = state.storage.clear_user_data();
    if !report.is_success() {
        tracing::warn!(failed = ?report.failed, "Some user data could not be cleared");
    }
    if report.written.is_empty() && !report.failed.is_empty() {
        return Err(AppError::Storage(StorageError::Unavailable(
            "No user data could be cleared".to_string(),
        )));
    }
    Ok(Json(report))
}
