// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed accessors for the well-known storage keys.
//!
//! Each accessor pairs one key with a default, a validating read and a
//! normalising write. Reads never fail: invalid or missing data yields the
//! documented default. Writes report success as a `bool`.

use crate::error::StorageError;
use crate::models::export::EXPORT_VERSION;
use crate::models::{
    CacheDocument, CacheEntry, DeviceInfo, ExportPayload, GamificationState, Preferences,
    Session, UserProfile, UserType, WriteReport, DEFAULT_CACHE_TTL,
};
use crate::services::manager::StorageManager;
use crate::store::keys;
use crate::time_utils::format_utc_rfc3339;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

impl StorageManager {
    fn now_iso(&self) -> String {
        format_utc_rfc3339(self.clock().now())
    }

    // ─── User Type ───────────────────────────────────────────────

    /// Stored user type, or `publico` if missing or not in the allow-list.
    pub fn get_user_type(&self) -> UserType {
        match self.get_value(keys::USER_TYPE) {
            None => UserType::default(),
            Some(Value::String(raw)) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Stored user type not recognised");
                UserType::default()
            }),
            Some(other) => {
                tracing::warn!(value = %other, "Stored user type is not a string");
                UserType::default()
            }
        }
    }

    pub fn set_user_type(&self, user_type: UserType) -> bool {
        self.set(keys::USER_TYPE, &user_type)
    }

    /// Parse and store a user type. Values outside the allow-list are
    /// rejected and leave the stored value untouched.
    pub fn set_user_type_str(&self, raw: &str) -> bool {
        match raw.parse::<UserType>() {
            Ok(user_type) => self.set_user_type(user_type),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected user type");
                false
            }
        }
    }

    // ─── Profile ─────────────────────────────────────────────────

    pub fn get_user_profile(&self) -> Option<UserProfile> {
        self.get(keys::USER_PROFILE)
    }

    /// Store `profile` with `updatedAt` set to now. No merging is done.
    pub fn set_user_profile(&self, mut profile: UserProfile) -> bool {
        profile.updated_at = self.now_iso();
        self.set(keys::USER_PROFILE, &profile)
    }

    // ─── Preferences ─────────────────────────────────────────────

    /// Stored preferences with missing fields filled from the defaults.
    pub fn get_preferences(&self) -> Preferences {
        self.get(keys::PREFERENCES).unwrap_or_default()
    }

    pub fn set_preferences(&self, preferences: &Preferences) -> bool {
        self.set(keys::PREFERENCES, preferences)
    }

    // ─── Gamification ────────────────────────────────────────────

    pub fn get_gamification(&self) -> Option<GamificationState> {
        self.get(keys::GAMIFICATION)
    }

    /// Store `state` with `lastActionAt` set to now.
    pub fn set_gamification(&self, mut state: GamificationState) -> bool {
        state.last_action_at = self.now_iso();
        self.set(keys::GAMIFICATION, &state)
    }

    // ─── Session ─────────────────────────────────────────────────

    pub fn get_session(&self) -> Option<Session> {
        self.get(keys::SESSION)
    }

    /// Store `session` with `lastLogin` set to now.
    pub fn set_session(&self, mut session: Session) -> bool {
        session.last_login = self.now_iso();
        self.set(keys::SESSION, &session)
    }

    /// Create and store a fresh session for `device_info`.
    pub fn start_session(&self, device_info: DeviceInfo) -> Option<Session> {
        let session = match Session::start(device_info, &self.now_iso()) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start session");
                return None;
            }
        };
        self.set(keys::SESSION, &session).then_some(session)
    }

    // ─── Auth token and app lists ────────────────────────────────

    pub fn get_auth_token(&self) -> Option<String> {
        self.get(keys::AUTH_TOKEN)
    }

    pub fn set_auth_token(&self, token: &str) -> bool {
        self.set(keys::AUTH_TOKEN, token)
    }

    /// A list stored under `key` (chat history, invites, ...), empty if
    /// missing or malformed.
    pub fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.get(key).unwrap_or_default()
    }

    // ─── TTL Cache ───────────────────────────────────────────────

    pub fn get_cache_document(&self) -> Option<CacheDocument> {
        self.get(keys::CACHE)
    }

    /// Cache entry for `key`, stale or not.
    pub fn get_cache(&self, key: &str) -> Option<CacheEntry> {
        self.get_cache_document()?.data.remove(key)
    }

    /// Cached value for `key` decoded as `T`, only if it has not expired.
    pub fn get_fresh_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.get_cache(key)?;
        if entry.is_expired(self.clock().now_millis()) {
            return None;
        }
        serde_json::from_value(entry.value).ok()
    }

    /// Cache `value` under `key` for the default TTL (one hour).
    pub fn set_cache<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set_cache_with_ttl(key, value, DEFAULT_CACHE_TTL)
    }

    pub fn set_cache_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache value cannot be serialized");
                return false;
            }
        };

        let Some(mut document) = self.load_cache_document() else {
            return false;
        };

        let now = self.clock().now();
        document.insert(
            key,
            value,
            ttl,
            now.timestamp_millis(),
            &format_utc_rfc3339(now),
        );
        self.set(keys::CACHE, &document)
    }

    /// Drop one cache entry. `false` only if persisting the change failed.
    pub fn remove_cache(&self, key: &str) -> bool {
        let Some(mut document) = self.get_cache_document() else {
            return true;
        };
        if document.data.remove(key).is_none() {
            return true;
        }
        self.set(keys::CACHE, &document)
    }

    /// Remove expired cache entries. The document is only rewritten when
    /// something was removed. Returns the number of entries dropped.
    pub fn clear_expired_cache(&self) -> usize {
        let Some(mut document) = self.get_cache_document() else {
            return 0;
        };

        let expired = document.sweep_expired(self.clock().now_millis());
        if expired.is_empty() {
            return 0;
        }

        tracing::debug!(count = expired.len(), keys = ?expired, "Swept expired cache entries");
        if !self.set(keys::CACHE, &document) {
            return 0;
        }
        expired.len()
    }

    /// Current cache document, a fresh one if none is stored, or `None`
    /// when the stored one is unreadable (it is left alone).
    fn load_cache_document(&self) -> Option<CacheDocument> {
        match self.get_value(keys::CACHE) {
            None => Some(CacheDocument::default()),
            Some(raw) => match serde_json::from_value(raw) {
                Ok(document) => Some(document),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored cache document is malformed");
                    None
                }
            },
        }
    }

    // ─── Bulk operations ─────────────────────────────────────────

    /// Remove every user-scoped key (see [`keys::USER_DATA`]).
    ///
    /// Best effort: failures are reported, nothing is rolled back.
    pub fn clear_user_data(&self) -> WriteReport {
        let mut report = WriteReport::default();
        for key in keys::USER_DATA {
            report.record(key, self.remove(key));
        }
        if !report.is_success() {
            tracing::warn!(failed = ?report.failed, "Some user data could not be cleared");
        }
        report
    }

    /// Snapshot every known key that currently holds a value.
    pub fn export_user_data(&self) -> ExportPayload {
        let data: BTreeMap<String, Value> = keys::ALL
            .iter()
            .filter_map(|key| self.get_value(key).map(|value| (key.to_string(), value)))
            .collect();

        ExportPayload {
            export_date: self.now_iso(),
            version: EXPORT_VERSION.to_string(),
            data,
        }
    }

    /// Write back every entry of an export's `data` object.
    ///
    /// A payload without a `data` object is rejected before anything is
    /// written. Individual write failures are reported, not rolled back.
    pub fn import_user_data(&self, payload: &Value) -> Result<WriteReport, StorageError> {
        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                StorageError::InvalidImport("expected a `data` object".to_string())
            })?;

        let mut report = WriteReport::default();
        for (key, value) in data {
            report.record(key, self.set_value(key, value.clone()));
        }

        tracing::info!(
            written = report.written.len(),
            failed = report.failed.len(),
            "Imported user data"
        );
        Ok(report)
    }
}
