// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Export/import payloads and multi-key write reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Version tag written into exports.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Everything stored under the known keys, as produced by
/// `export_user_data` and accepted back by `import_user_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExportPayload {
    /// ISO 8601
    pub export_date: String,
    pub version: String,
    pub data: BTreeMap<String, Value>,
}

/// Outcome of a best-effort operation over several keys.
///
/// Nothing is rolled back; keys that failed are listed so the caller can
/// retry or warn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WriteReport {
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

impl WriteReport {
    pub fn record(&mut self, key: &str, ok: bool) {
        if ok {
            self.written.push(key.to_string());
        } else {
            self.failed.push(key.to_string());
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
