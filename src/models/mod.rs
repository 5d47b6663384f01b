// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the values kept in storage.

pub mod cache;
pub mod export;
pub mod gamification;
pub mod preferences;
pub mod session;
pub mod user;

pub use cache::{CacheDocument, CacheEntry, DEFAULT_CACHE_TTL};
pub use export::{ExportPayload, WriteReport};
pub use gamification::{GamificationState, Level};
pub use preferences::{
    Language, NotificationSettings, Preferences, PrivacySettings, ProfileVisibility, Theme,
};
pub use session::{DeviceInfo, Session};
pub use user::{UserProfile, UserType};
