// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TTL cache document.
//!
//! Many logical cache entries share the single `cache` storage key. An
//! entry goes fresh → stale (still present) → swept; nothing expires on a
//! timer, staleness is a comparison made when someone reads or sweeps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Format version written into new cache documents.
pub const CACHE_VERSION: &str = "1.0.0";

/// TTL used when the caller gives none (one hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(3_600_000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CacheEntry {
    pub value: Value,
    /// Epoch milliseconds when written
    pub timestamp: i64,
    /// Milliseconds
    pub ttl: u64,
}

impl CacheEntry {
    /// Expired once strictly more than `ttl` has passed since `timestamp`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        (now_millis as i128 - self.timestamp as i128) > self.ttl as i128
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CacheDocument {
    pub data: BTreeMap<String, CacheEntry>,
    /// ISO 8601
    pub last_updated: String,
    pub version: String,
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
            last_updated: String::new(),
            version: CACHE_VERSION.to_string(),
        }
    }
}

impl CacheDocument {
    /// Insert or overwrite one entry.
    pub fn insert(&mut self, key: &str, value: Value, ttl: Duration, now_millis: i64, now: &str) {
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value,
                timestamp: now_millis,
                ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            },
        );
        self.last_updated = now.to_string();
    }

    /// Drop expired entries, returning their keys.
    pub fn sweep_expired(&mut self, now_millis: i64) -> Vec<String> {
        let expired: Vec<String> = self
            .data
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_millis))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.data.remove(key);
        }
        expired
    }
}
