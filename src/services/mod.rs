// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - storage manager, change events and bindings.

mod accessors;
pub mod bindings;
pub mod events;
pub mod manager;
pub mod sync;

pub use bindings::{
    AppStorage, Binding, CacheBinding, GamificationBinding, PreferencesBinding, ProfileBinding,
    SessionBinding, StorageInfoBinding, UserTypeBinding,
};
pub use events::{EventBus, StorageChange, Subscription};
pub use manager::{StorageInfo, StorageManager};
pub use sync::{spawn_cache_sweeper, spawn_external_sync, MaintenanceTasks};
