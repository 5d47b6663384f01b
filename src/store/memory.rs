// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store with an optional quota and an availability switch.

use super::{check_quota, KeyValueStore, StorageEvent};
use crate::error::StorageError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered in-memory map behind the [`KeyValueStore`] contract.
///
/// `set_available(false)` makes every call fail the way a disabled browser
/// store does. Writes made through [`MemoryStore::write_external`] bypass
/// the manager and are reported by `poll_external_changes`, which is how
/// tests stand in for a second tab.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    available: AtomicBool,
    external: Mutex<Vec<StorageEvent>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
            available: AtomicBool::new(true),
            external: Mutex::new(Vec::new()),
        }
    }

    /// Store that rejects writes growing it beyond `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Write (or remove, with `None`) a raw value as another writer would.
    pub fn write_external(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        {
            let mut entries = self.write()?;
            match value {
                Some(v) => {
                    entries.insert(key.to_string(), v.to_string());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        self.external_events()?
            .push(StorageEvent::changed(key, value.map(str::to_string)));
        Ok(())
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("store disabled".to_string()))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.check_available()?;
        self.entries
            .read()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.check_available()?;
        self.entries
            .write()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }

    fn external_events(&self) -> Result<MutexGuard<'_, Vec<StorageEvent>>, StorageError> {
        self.external
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.write()?;
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.write()?.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.len())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.read()?.keys().nth(index).cloned())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn poll_external_changes(&self) -> Result<Vec<StorageEvent>, StorageError> {
        self.check_available()?;
        Ok(std::mem::take(&mut *self.external_events()?))
    }
}
