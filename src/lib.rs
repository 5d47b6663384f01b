// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interbox storage: typed local persistence for the CERRADØ INTERBOX app.
//!
//! This crate wraps a string key-value store with JSON values, a read
//! cache, change notification, a TTL cache, typed accessors for the app's
//! well-known keys and reactive bindings. A small admin HTTP API exposes
//! the server-side store.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::StorageManager;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<StorageManager>,
}
