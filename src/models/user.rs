// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User type and profile models.

use crate::error::StorageError;
use crate::models::gamification::GamificationState;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Role a visitor plays at the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum UserType {
    Atleta,
    Audiovisual,
    /// Least-privileged role; the fallback for anything unrecognised.
    #[default]
    Publico,
    Admin,
}

impl UserType {
    /// The allow-list.
    pub const ALL: [UserType; 4] = [
        UserType::Atleta,
        UserType::Audiovisual,
        UserType::Publico,
        UserType::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Atleta => "atleta",
            UserType::Audiovisual => "audiovisual",
            UserType::Publico => "publico",
            UserType::Admin => "admin",
        }
    }

    /// Deserialize, mapping unknown or malformed values to `Publico`.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StorageError::InvalidValue(format!("unknown user type: {s}")))
    }
}

/// Locally mirrored user profile.
///
/// Missing fields fall back to their defaults when read; fields of the wrong
/// type reject the whole record. An unrecognised `role` reads as `publico`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    /// Firebase auth user id
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(deserialize_with = "UserType::deserialize_lenient")]
    pub role: UserType,
    pub is_active: bool,
    /// ISO 8601
    pub created_at: String,
    /// ISO 8601, stamped on every write
    pub updated_at: String,
    pub gamification: GamificationState,
}
