// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage manager: typed, fail-soft access to a [`KeyValueStore`] with a
//! write-through read cache and change notification.
//!
//! One manager is built at startup and shared as `Arc<StorageManager>`.
//! Nothing here panics or returns an error across the public boundary:
//! reads degrade to `None`/the default, writes report `false`, and the
//! reason goes to the log.

use crate::error::StorageError;
use crate::services::events::{EventBus, StorageChange, Subscription};
use crate::store::{KeyValueStore, StorageEvent};
use crate::time_utils::{Clock, SystemClock};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Snapshot of the store's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StorageInfo {
    pub available: bool,
    pub size: usize,
    pub keys: Vec<String>,
    pub cache_size: usize,
}

/// Typed facade over a persistent key-value store.
pub struct StorageManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    cache: DashMap<String, Value>,
    events: EventBus,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("cache_size", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl StorageManager {
    /// Manager over `store` using wall-clock time.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cache: DashMap::new(),
            events: EventBus::new(),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Probe the store with a harmless write+delete.
    pub fn is_available(&self) -> bool {
        match self.store.probe() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Storage unavailable");
                false
            }
        }
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Raw JSON value at `key`.
    ///
    /// Served from the cache when possible. Missing keys, unavailable
    /// storage and malformed JSON all yield `None`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        if !self.is_available() {
            return None;
        }

        if let Some(cached) = self.cache.get(key) {
            tracing::trace!(key = %key, "Storage cache hit");
            return Some(cached.value().clone());
        }

        // The store is read under the entry guard so a concurrent write to
        // `key` cannot land between our read and our cache fill.
        let vacant = match self.cache.entry(key.to_string()) {
            Entry::Occupied(cached) => return Some(cached.get().clone()),
            Entry::Vacant(vacant) => vacant,
        };

        let raw = match self.store.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error reading from storage");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                vacant.insert(value.clone());
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stored value is not valid JSON");
                None
            }
        }
    }

    /// Value at `key` decoded as `T`; `None` if absent or of the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stored value has unexpected shape");
                None
            }
        }
    }

    /// Value at `key`, or `default` when it cannot be read.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        matches!(self.store.get_item(key), Ok(Some(_)))
    }

    pub fn keys(&self) -> Vec<String> {
        if !self.is_available() {
            return Vec::new();
        }
        self.store.keys().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Error listing storage keys");
            Vec::new()
        })
    }

    pub fn size(&self) -> usize {
        if !self.is_available() {
            return 0;
        }
        self.store.len().unwrap_or(0)
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Serialize `value` and store it at `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set_value(key, value),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Value cannot be serialized");
                false
            }
        }
    }

    /// Store a JSON value at `key`, update the cache, notify listeners.
    ///
    /// The cache entry for `key` stays locked from the store write until
    /// the cache holds the new value, so cache and store agree even under
    /// concurrent writers. Listeners run after the lock is released.
    pub fn set_value(&self, key: &str, value: Value) -> bool {
        let result = {
            let entry = self.cache.entry(key.to_string());
            let result = self.try_set(key, &value);
            if result.is_ok() {
                entry.insert(value.clone());
            }
            result
        };

        match result {
            Ok(()) => {
                self.events.publish(&StorageChange::Set {
                    key: key.to_string(),
                    value,
                });
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error writing to storage");
                false
            }
        }
    }

    fn try_set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.store.probe()?;
        let serialized =
            serde_json::to_string(value).map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.store.set_item(key, &serialized)
    }

    /// Remove `key`. Removing an absent key succeeds.
    pub fn remove(&self, key: &str) -> bool {
        let result = {
            let entry = self.cache.entry(key.to_string());
            let result = self
                .store
                .probe()
                .and_then(|()| self.store.remove_item(key));
            if let (Ok(()), Entry::Occupied(cached)) = (&result, entry) {
                cached.remove();
            }
            result
        };

        match result {
            Ok(()) => {
                self.events.publish(&StorageChange::Removed {
                    key: key.to_string(),
                });
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error removing from storage");
                false
            }
        }
    }

    /// Wipe the whole store. Every key listener is told `None`.
    pub fn clear(&self) -> bool {
        let result = self.store.probe().and_then(|()| self.store.clear());

        match result {
            Ok(()) => {
                self.cache.clear();
                self.events.publish(&StorageChange::Cleared);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Error clearing storage");
                false
            }
        }
    }

    // ─── Cache ───────────────────────────────────────────────────

    /// Forget cached values so the next reads hit the store.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn info(&self) -> StorageInfo {
        StorageInfo {
            available: self.is_available(),
            size: self.size(),
            keys: self.keys(),
            cache_size: self.cache_size(),
        }
    }

    // ─── Listeners ───────────────────────────────────────────────

    /// Call `listener` with the new value whenever `key` changes.
    pub fn subscribe<F>(&self, key: &str, listener: F) -> Subscription
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.events.subscribe(key, listener)
    }

    /// Call `listener` on every change to any key.
    pub fn subscribe_any<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StorageChange) + Send + Sync + 'static,
    {
        self.events.subscribe_any(listener)
    }

    // ─── External changes ────────────────────────────────────────

    /// Fold in a change another context made to the shared substrate.
    ///
    /// The affected cache entry (or the whole cache, for a clear) is
    /// invalidated and listeners see the new value.
    pub fn apply_external_change(&self, event: &StorageEvent) {
        let Some(key) = &event.key else {
            self.cache.clear();
            self.events.publish(&StorageChange::External {
                key: None,
                value: None,
            });
            return;
        };

        self.cache.remove(key);

        let value = event
            .new_value
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<Value>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "External value is not valid JSON");
                    None
                }
            });

        self.events.publish(&StorageChange::External {
            key: Some(key.clone()),
            value,
        });
    }

    /// Pull pending external changes from the store and apply them.
    ///
    /// Returns the number of changes applied.
    pub fn sync_external_changes(&self) -> usize {
        let events = match self.store.poll_external_changes() {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll external storage changes");
                return 0;
            }
        };

        for event in &events {
            self.apply_external_change(event);
        }
        events.len()
    }
}
