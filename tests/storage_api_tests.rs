// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP tests for the raw key-value, export/import and user routes.

use axum::http::StatusCode;
use interbox_storage::models::UserType;
use interbox_storage::store::keys;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{admin_request, body_json, create_test_app};

#[tokio::test]
async fn test_put_get_delete_key() {
    let (app, state) = create_test_app();

    let response = app
        .clone()
        .oneshot(admin_request(
            "PUT",
            "/api/storage/keys/chatHistory",
            Some(json!([{ "text": "bom dia" }])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.storage.has(keys::CHAT_HISTORY));

    let response = app
        .clone()
        .oneshot(admin_request("GET", "/api/storage/keys/chatHistory", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([{ "text": "bom dia" }]));

    let response = app
        .clone()
        .oneshot(admin_request("DELETE", "/api/storage/keys/chatHistory", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(admin_request("GET", "/api/storage/keys/chatHistory", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_overlong_key_is_rejected() {
    let (app, state) = create_test_app();
    let key = "k".repeat(129);

    let response = app
        .oneshot(admin_request(
            "PUT",
            &format!("/api/storage/keys/{key}"),
            Some(json!(1)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
    assert!(!state.storage.has(&key));
}

#[tokio::test]
async fn test_info_reports_size_and_keys() {
    let (app, state) = create_test_app();
    state.storage.set(keys::USER_TYPE, "atleta");
    state.storage.set(keys::THEME, "dark");

    let response = app
        .oneshot(admin_request("GET", "/api/storage/info", None))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["available"], true);
    assert_eq!(body["size"], 2);
    assert_eq!(body["keys"], json!(["theme", "userType"]));
}

#[tokio::test]
async fn test_export_then_import_into_fresh_app() {
    let (app, state) = create_test_app();
    state.storage.set_user_type(UserType::Audiovisual);
    state.storage.set(keys::TEAM_INVITES, &json!(["team-1"]));

    let response = app
        .oneshot(admin_request("GET", "/api/storage/export", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let export = body_json(response).await;
    assert_eq!(export["version"], "1.0.0");
    assert!(export["exportDate"].is_string());

    let (other_app, other_state) = create_test_app();
    let response = other_app
        .oneshot(admin_request("POST", "/api/storage/import", Some(export)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(response).await;
    assert_eq!(report["failed"], json!([]));
    assert_eq!(other_state.storage.get_user_type(), UserType::Audiovisual);
    assert_eq!(
        other_state.storage.get_list::<String>(keys::TEAM_INVITES),
        vec!["team-1".to_string()]
    );
}

#[tokio::test]
async fn test_import_without_data_is_bad_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(admin_request(
            "POST",
            "/api/storage/import",
            Some(json!({ "version": "1.0.0" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_payload");
}

#[tokio::test]
async fn test_cache_sweep_endpoint() {
    let (app, state) = create_test_app();
    state
        .storage
        .set_cache_with_ttl("gone", &1, std::time::Duration::ZERO);
    std::thread::sleep(std::time::Duration::from_millis(5));
    state.storage.set_cache("kept", &2);

    let response = app
        .oneshot(admin_request("POST", "/api/storage/cache/sweep", None))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["removed"], 1);
    assert!(state.storage.get_cache("gone").is_none());
    assert!(state.storage.get_cache("kept").is_some());
}

#[tokio::test]
async fn test_user_type_allow_list() {
    let (app, state) = create_test_app();

    let response = app
        .clone()
        .oneshot(admin_request(
            "PUT",
            "/api/user/type",
            Some(json!({ "userType": "superuser" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.storage.get_user_type(), UserType::Publico);

    let response = app
        .oneshot(admin_request(
            "PUT",
            "/api/user/type",
            Some(json!({ "userType": "admin" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["userType"], "admin");
    assert_eq!(state.storage.get_user_type(), UserType::Admin);
}

#[tokio::test]
async fn test_get_user_defaults() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(admin_request("GET", "/api/user", None))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["userType"], "publico");
    assert_eq!(body["profile"], json!(null));
    assert_eq!(body["preferences"]["language"], "pt-BR");
    assert_eq!(body["preferences"]["theme"], "auto");
}

#[tokio::test]
async fn test_clear_user_data_keeps_user_type() {
    let (app, state) = create_test_app();
    state.storage.set_user_type(UserType::Atleta);
    state.storage.set_auth_token("tok");
    state.storage.set(keys::PAYMENT_HISTORY, &json!([{ "amount": 120 }]));

    let response = app
        .oneshot(admin_request("DELETE", "/api/user/data", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = body_json(response).await;
    assert_eq!(report["written"].as_array().unwrap().len(), 7);
    assert_eq!(state.storage.get_auth_token(), None);
    assert!(!state.storage.has(keys::PAYMENT_HISTORY));
    assert_eq!(state.storage.get_user_type(), UserType::Atleta);
}
