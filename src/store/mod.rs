// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistent key-value substrates.
//!
//! A [`KeyValueStore`] is the synchronous, string-keyed, string-valued store
//! the storage manager adapts: browser local storage in the web client, a
//! JSON file on the server, or an in-memory map in tests. Implementations
//! report failures as [`StorageError`]; turning those into fail-soft return
//! values is the manager's job.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;
use std::collections::BTreeMap;

/// Key written and removed by the availability probe.
pub const PROBE_KEY: &str = "__storage_test__";

/// Storage key names.
///
/// Keys are flat (no prefix), so anything else sharing the same store can
/// collide with them.
pub mod keys {
    pub const USER_TYPE: &str = "userType";
    pub const USER_PROFILE: &str = "userProfile";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const PREFERENCES: &str = "preferences";
    pub const SESSION: &str = "session";
    pub const CACHE: &str = "cache";
    pub const THEME: &str = "theme";
    pub const LANGUAGE: &str = "language";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const PRIVACY: &str = "privacy";
    pub const GAMIFICATION: &str = "gamification";
    pub const REFERRAL_CODE: &str = "referralCode";
    pub const LAST_LOGIN: &str = "lastLogin";
    pub const DEVICE_INFO: &str = "deviceInfo";
    pub const APP_VERSION: &str = "appVersion";
    pub const FEATURE_FLAGS: &str = "featureFlags";
    pub const ANALYTICS: &str = "analytics";
    pub const CHAT_HISTORY: &str = "chatHistory";
    pub const AUDIOVISUAL_SUBMISSIONS: &str = "audiovisualSubmissions";
    pub const TEAM_INVITES: &str = "teamInvites";
    pub const PAYMENT_HISTORY: &str = "paymentHistory";

    /// Every known key, in export order.
    pub const ALL: &[&str] = &[
        USER_TYPE,
        USER_PROFILE,
        AUTH_TOKEN,
        PREFERENCES,
        SESSION,
        CACHE,
        THEME,
        LANGUAGE,
        NOTIFICATIONS,
        PRIVACY,
        GAMIFICATION,
        REFERRAL_CODE,
        LAST_LOGIN,
        DEVICE_INFO,
        APP_VERSION,
        FEATURE_FLAGS,
        ANALYTICS,
        CHAT_HISTORY,
        AUDIOVISUAL_SUBMISSIONS,
        TEAM_INVITES,
        PAYMENT_HISTORY,
    ];

    /// Keys removed when a user's data is cleared (logout).
    ///
    /// `userType`, `preferences`, `gamification` and `cache` survive.
    pub const USER_DATA: &[&str] = &[
        USER_PROFILE,
        AUTH_TOKEN,
        SESSION,
        CHAT_HISTORY,
        AUDIOVISUAL_SUBMISSIONS,
        TEAM_INVITES,
        PAYMENT_HISTORY,
    ];
}

/// A change made to the substrate by someone other than this process's
/// storage manager (another tab, another process sharing the file).
///
/// Mirrors the platform storage event: `key == None` means the whole store
/// was cleared; `new_value == None` means the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn changed(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value,
        }
    }

    pub fn cleared() -> Self {
        Self {
            key: None,
            new_value: None,
        }
    }
}

/// Synchronous string-keyed, string-valued persistent store.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// May fail with [`StorageError::QuotaExceeded`] or
    /// [`StorageError::Unavailable`].
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    fn len(&self) -> Result<usize, StorageError>;

    fn key(&self, index: usize) -> Result<Option<String>, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Check that the store accepts writes with a write+delete cycle.
    fn probe(&self) -> Result<(), StorageError> {
        self.set_item(PROBE_KEY, PROBE_KEY)?;
        self.remove_item(PROBE_KEY)
    }

    /// Changes made by other writers since the last poll.
    fn poll_external_changes(&self) -> Result<Vec<StorageEvent>, StorageError> {
        Ok(Vec::new())
    }
}

/// Store for environments with no persistent substrate at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn unavailable<T>() -> Result<T, StorageError> {
        Err(StorageError::Unavailable(
            "no persistent store in this environment".to_string(),
        ))
    }
}

impl KeyValueStore for UnavailableStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Self::unavailable()
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Self::unavailable()
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Self::unavailable()
    }

    fn clear(&self) -> Result<(), StorageError> {
        Self::unavailable()
    }

    fn len(&self) -> Result<usize, StorageError> {
        Self::unavailable()
    }

    fn key(&self, _index: usize) -> Result<Option<String>, StorageError> {
        Self::unavailable()
    }
}

/// Bytes used by a set of entries (keys plus values).
pub(crate) fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Check whether writing `value` at `key` keeps `entries` within `quota`.
pub(crate) fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };

    let current = used_bytes(entries);
    let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    let needed = current - replaced + key.len() + value.len();

    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}
