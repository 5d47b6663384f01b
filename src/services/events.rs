// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change notification registry.
//!
//! Listeners subscribe either to one storage key or to "any key changed".
//! Every subscription hands back a [`Subscription`] guard; dropping it
//! deregisters exactly that listener. Dispatch is synchronous, in the
//! caller's stack, and each listener runs under its own `catch_unwind` so a
//! panicking listener cannot starve the others or abort the write that
//! triggered it.

use dashmap::DashMap;
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Callback for a single key. Receives the new value, or `None` when the
/// key was removed or the store cleared.
pub type KeyListener = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// Callback for every change on every key.
pub type AnyListener = Arc<dyn Fn(&StorageChange) + Send + Sync>;

/// What happened to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageChange {
    Set { key: String, value: Value },
    Removed { key: String },
    Cleared,
    /// Written by another context sharing the substrate. `key == None`
    /// means that context cleared the store.
    External {
        key: Option<String>,
        value: Option<Value>,
    },
}

impl StorageChange {
    /// Key affected, if the change concerns a single key.
    pub fn key(&self) -> Option<&str> {
        match self {
            StorageChange::Set { key, .. } | StorageChange::Removed { key } => Some(key),
            StorageChange::External { key, .. } => key.as_deref(),
            StorageChange::Cleared => None,
        }
    }

    /// New value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            StorageChange::Set { value, .. } => Some(value),
            StorageChange::External { value, .. } => value.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Topic {
    Key(String),
    AnyKey,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    by_key: DashMap<String, Vec<(u64, KeyListener)>>,
    any: RwLock<Vec<(u64, AnyListener)>>,
}

impl Registry {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn remove(&self, topic: &Topic, id: u64) {
        match topic {
            Topic::Key(key) => {
                if let Some(mut listeners) = self.by_key.get_mut(key) {
                    listeners.retain(|(listener_id, _)| *listener_id != id);
                }
                self.by_key.remove_if(key, |_, listeners| listeners.is_empty());
            }
            Topic::AnyKey => {
                let mut any = self.any.write().unwrap_or_else(|e| e.into_inner());
                any.retain(|(listener_id, _)| *listener_id != id);
            }
        }
    }
}

/// Handle for one registered listener.
///
/// The listener stays registered while this guard is alive.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    registry: Weak<Registry>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    /// Key this subscription listens to (`None` for any-key subscriptions).
    pub fn key(&self) -> Option<&str> {
        match &self.topic {
            Topic::Key(key) => Some(key),
            Topic::AnyKey => None,
        }
    }

    /// Deregister now. Same as dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.topic, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

/// Per-key publish/subscribe registry.
#[derive(Default, Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for changes to `key`.
    pub fn subscribe<F>(&self, key: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let key = key.into();
        let id = self.registry.next_id();
        self.registry
            .by_key
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic: Topic::Key(key),
            id,
        }
    }

    /// Listen for every change, whatever the key.
    pub fn subscribe_any<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StorageChange) + Send + Sync + 'static,
    {
        let id = self.registry.next_id();
        self.registry
            .any
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic: Topic::AnyKey,
            id,
        }
    }

    /// Dispatch a change to the key listeners it concerns, then to the
    /// any-key listeners.
    pub fn publish(&self, change: &StorageChange) {
        match change {
            StorageChange::Set { key, value } => self.notify_key(key, Some(value)),
            StorageChange::Removed { key } => self.notify_key(key, None),
            StorageChange::External {
                key: Some(key),
                value,
            } => self.notify_key(key, value.as_ref()),
            StorageChange::Cleared | StorageChange::External { key: None, .. } => {
                self.notify_every_key_cleared()
            }
        }
        self.notify_any(change);
    }

    /// Number of listeners registered on `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.registry.by_key.get(key).map(|l| l.len()).unwrap_or(0)
    }

    /// Number of any-key listeners.
    pub fn any_listener_count(&self) -> usize {
        self.registry
            .any
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn notify_key(&self, key: &str, value: Option<&Value>) {
        // Snapshot so listeners can (un)subscribe without deadlocking.
        let listeners: Vec<KeyListener> = match self.registry.by_key.get(key) {
            Some(entry) => entry.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
                tracing::error!(
                    key = %key,
                    error = %panic_message(panic.as_ref()),
                    "Storage listener panicked"
                );
            }
        }
    }

    fn notify_every_key_cleared(&self) {
        let listeners: Vec<(String, KeyListener)> = self
            .registry
            .by_key
            .iter()
            .flat_map(|entry| {
                let key = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(move |(_, l)| (key.clone(), l.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (key, listener) in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(None))) {
                tracing::error!(
                    key = %key,
                    error = %panic_message(panic.as_ref()),
                    "Storage listener panicked"
                );
            }
        }
    }

    fn notify_any(&self, change: &StorageChange) {
        let listeners: Vec<AnyListener> = self
            .registry
            .any
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(change))) {
                tracing::error!(
                    key = ?change.key(),
                    error = %panic_message(panic.as_ref()),
                    "Storage any-key listener panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
