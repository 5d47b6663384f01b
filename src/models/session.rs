// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login session record.

use crate::error::StorageError;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Device metadata captured when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    /// "{width}x{height}"
    pub screen_size: String,
}

impl DeviceInfo {
    pub fn new(
        user_agent: impl Into<String>,
        platform: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            platform: platform.into(),
            screen_size: format!("{width}x{height}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Session {
    /// ISO 8601, stamped on every write
    pub last_login: String,
    pub session_id: String,
    pub device_info: DeviceInfo,
}

impl Session {
    /// New session with a random id.
    pub fn start(device_info: DeviceInfo, now: &str) -> Result<Self, StorageError> {
        Ok(Self {
            last_login: now.to_string(),
            session_id: generate_session_id()?,
            device_info,
        })
    }
}

/// 128 random bits, hex encoded.
pub fn generate_session_id() -> Result<String, StorageError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| StorageError::Unavailable("system random source failed".to_string()))?;
    Ok(hex::encode(bytes))
}
