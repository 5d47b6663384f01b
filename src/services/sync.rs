// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background maintenance: periodic cache sweeps and external-change sync.

use crate::services::manager::StorageManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How often expired cache entries are swept by default (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest period either task will tick at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// `tokio::time::interval` panics on a zero period.
fn clamp_interval(task: &'static str, interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        tracing::warn!(task, requested = ?interval, "Interval too short, clamping");
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Sweep expired cache entries every `interval`.
pub fn spawn_cache_sweeper(storage: Arc<StorageManager>, interval: Duration) -> JoinHandle<()> {
    let interval = clamp_interval("cache_sweeper", interval);
    tokio::spawn(async move {
        tracing::info!(interval = ?interval, "Cache sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let removed = storage.clear_expired_cache();
            if removed > 0 {
                tracing::debug!(removed, "Swept expired cache entries");
            }
        }
    })
}

/// Poll the store for writes made by other processes every `interval`.
pub fn spawn_external_sync(storage: Arc<StorageManager>, interval: Duration) -> JoinHandle<()> {
    let interval = clamp_interval("external_sync", interval);
    tokio::spawn(async move {
        tracing::info!(interval = ?interval, "External change sync started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let applied = storage.sync_external_changes();
            if applied > 0 {
                tracing::debug!(applied, "Applied external storage changes");
            }
        }
    })
}

/// Both maintenance tasks; aborted when dropped.
#[derive(Debug)]
pub struct MaintenanceTasks {
    sweeper: JoinHandle<()>,
    sync: JoinHandle<()>,
}

impl MaintenanceTasks {
    pub fn spawn(
        storage: &Arc<StorageManager>,
        sweep_interval: Duration,
        sync_interval: Duration,
    ) -> Self {
        Self {
            sweeper: spawn_cache_sweeper(storage.clone(), sweep_interval),
            sync: spawn_external_sync(storage.clone(), sync_interval),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.sweeper.is_finished() && !self.sync.is_finished()
    }
}

impl Drop for MaintenanceTasks {
    fn drop(&mut self) {
        self.sweeper.abort();
        self.sync.abort();
    }
}
