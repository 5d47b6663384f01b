// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interbox storage API server
//!
//! Serves the file-backed store behind an admin HTTP API and keeps its
//! cache swept and in sync with writes from other processes.

use anyhow::Context;
use interbox_storage::{
    config::Config,
    services::{MaintenanceTasks, StorageManager},
    store::FileStore,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Interbox storage API");

    let store = FileStore::open(&config.storage_path, Some(config.storage_quota_bytes))
        .with_context(|| format!("Failed to open {}", config.storage_path.display()))?;
    tracing::info!(
        path = %config.storage_path.display(),
        quota_bytes = config.storage_quota_bytes,
        "File store opened"
    );

    let storage = Arc::new(StorageManager::new(Arc::new(store)));
    if !storage.is_available() {
        tracing::warn!("Storage is not writable; writes will fail");
    }

    let _maintenance = MaintenanceTasks::spawn(
        &storage,
        config.cache_sweep_interval,
        config.sync_poll_interval,
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        storage,
    });

    let app = interbox_storage::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("interbox_storage=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
