// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use interbox_storage::config::Config;
use interbox_storage::routes::create_router;
use interbox_storage::services::StorageManager;
use interbox_storage::store::MemoryStore;
use interbox_storage::AppState;
use std::sync::Arc;

/// Token accepted by the test app's admin middleware.
#[allow(dead_code)]
pub const TEST_TOKEN: &str = "test_admin_token";

/// Create a test app backed by an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config {
        admin_token: TEST_TOKEN.to_string(),
        ..Config::default()
    };
    let storage = Arc::new(StorageManager::new(Arc::new(MemoryStore::new())));

    let state = Arc::new(AppState { config, storage });

    (create_router(state.clone()), state)
}

/// Build an authorized request, with a JSON body if one is given.
#[allow(dead_code)]
pub fn admin_request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TEST_TOKEN}"));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
