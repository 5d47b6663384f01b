// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reactive bindings: a key's value mirrored into local state.
//!
//! A binding reads its key once when mounted, then follows every change
//! through a [`Subscription`] it owns. Dropping the binding drops the
//! subscription, so an unmounted view never leaves a dead listener behind.

use crate::models::{
    CacheEntry, DeviceInfo, GamificationState, Language, NotificationSettings, Preferences,
    PrivacySettings, Session, Theme, UserProfile, UserType, WriteReport,
};
use crate::services::events::Subscription;
use crate::services::manager::{StorageInfo, StorageManager};
use crate::store::keys;
use crate::time_utils::{format_utc_rfc3339, Clock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

type Decoder<T> = Arc<dyn Fn(Option<&Value>) -> Option<T> + Send + Sync>;
type Observer<T> = Box<dyn Fn(Option<&T>) + Send + Sync>;

struct BindingState<T> {
    value: RwLock<Option<T>>,
    generation: AtomicU64,
    observer: RwLock<Option<Observer<T>>>,
}

impl<T: Clone> BindingState<T> {
    fn replace(&self, value: Option<T>) {
        *self.value.write().unwrap_or_else(|e| e.into_inner()) = value.clone();
        self.generation.fetch_add(1, Ordering::SeqCst);

        let observer = self.observer.read().unwrap_or_else(|e| e.into_inner());
        if let Some(observer) = observer.as_ref() {
            observer(value.as_ref());
        }
    }
}

fn decode_json<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Local mirror of one storage key.
pub struct Binding<T> {
    storage: Arc<StorageManager>,
    key: String,
    state: Arc<BindingState<T>>,
    _subscription: Subscription,
}

impl<T> Binding<T>
where
    T: DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
{
    /// Bind `key`, decoding values with serde. Values of the wrong shape
    /// show up as `None`.
    pub fn mount(storage: &Arc<StorageManager>, key: &str) -> Self {
        Self::mount_with(storage, key, decode_json::<T>)
    }

    /// Bind `key` with a custom decoder.
    pub fn mount_with<F>(storage: &Arc<StorageManager>, key: &str, decode: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<T> + Send + Sync + 'static,
    {
        let decode: Decoder<T> = Arc::new(decode);
        let initial = decode(storage.get_value(key).as_ref());

        let state = Arc::new(BindingState {
            value: RwLock::new(initial),
            generation: AtomicU64::new(0),
            observer: RwLock::new(None),
        });

        let listener_state = state.clone();
        let subscription = storage.subscribe(key, move |value| {
            listener_state.replace(decode(value));
        });

        Self {
            storage: storage.clone(),
            key: key.to_string(),
            state,
            _subscription: subscription,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub fn get(&self) -> Option<T> {
        self.state
            .value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Bumped on every observed change; a view re-renders when it moves.
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::SeqCst)
    }

    /// Call `observer` after each observed change.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        *self
            .state
            .observer
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Box::new(observer));
    }

    /// Store `value`, or remove the key for `None`.
    pub fn set(&self, value: Option<&T>) -> bool {
        match value {
            Some(value) => self.storage.set(&self.key, value),
            None => self.storage.remove(&self.key),
        }
    }
}

impl<T> Binding<T>
where
    T: DeserializeOwned + Serialize + Clone + Default + Send + Sync + 'static,
{
    pub fn get_or_default(&self) -> T {
        self.get().unwrap_or_default()
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("generation", &self.state.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// ─── User Type ───────────────────────────────────────────────

#[derive(Debug)]
pub struct UserTypeBinding {
    inner: Binding<UserType>,
}

impl UserTypeBinding {
    pub fn mount(storage: &Arc<StorageManager>) -> Self {
        let inner = Binding::<UserType>::mount_with(storage, keys::USER_TYPE, |value| {
            Some(
                value
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
            )
        });
        Self { inner }
    }

    pub fn get(&self) -> UserType {
        self.inner.get().unwrap_or_default()
    }

    pub fn set(&self, user_type: UserType) -> bool {
        self.inner.storage().set_user_type(user_type)
    }

    /// Rejects anything outside the allow-list.
    pub fn set_str(&self, raw: &str) -> bool {
        self.inner.storage().set_user_type_str(raw)
    }

    pub fn binding(&self) -> &Binding<UserType> {
        &self.inner
    }
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct ProfileBinding {
    inner: Binding<UserProfile>,
}

impl ProfileBinding {
    pub fn mount(storage: &Arc<StorageManager>) -> Self {
        Self {
            inner: Binding::mount(storage, keys::USER_PROFILE),
        }
    }

    pub fn get(&self) -> Option<UserProfile> {
        self.inner.get()
    }

    /// Apply `update` to the current profile (or an empty one) and store it.
    pub fn update<F: FnOnce(&mut UserProfile)>(&self, update: F) -> bool {
        let mut profile = self.get().unwrap_or_default();
        update(&mut profile);
        self.inner.storage().set_user_profile(profile)
    }

    pub fn clear(&self) -> bool {
        self.inner.set(None)
    }

    pub fn binding(&self) -> &Binding<UserProfile> {
        &self.inner
    }
}

// ─── Preferences ─────────────────────────────────────────────

#[derive(Debug)]
pub struct PreferencesBinding {
    inner: Binding<Preferences>,
}

impl PreferencesBinding {
    pub fn mount(storage: &Arc<StorageManager>) -> Self {
        Self {
            inner: Binding::mount(storage, keys::PREFERENCES),
        }
    }

    pub fn get(&self) -> Preferences {
        self.inner.get_or_default()
    }

    pub fn update<F: FnOnce(&mut Preferences)>(&self, update: F) -> bool {
        let mut preferences = self.get();
        update(&mut preferences);
        self.inner.storage().set_preferences(&preferences)
    }

    pub fn update_theme(&self, theme: Theme) -> bool {
        self.update(|p| p.theme = theme)
    }

    pub fn update_language(&self, language: Language) -> bool {
        self.update(|p| p.language = language)
    }

    pub fn update_notifications(&self, notifications: NotificationSettings) -> bool {
        self.update(|p| p.notifications = notifications)
    }

    pub fn update_privacy(&self, privacy: PrivacySettings) -> bool {
        self.update(|p| p.privacy = privacy)
    }

    pub fn binding(&self) -> &Binding<Preferences> {
        &self.inner
    }
}

// ─── Gamification ────────────────────────────────────────────

#[derive(Debug)]
pub struct GamificationBinding {
    inner: Binding<GamificationState>,
}

impl GamificationBinding {
    pub fn mount(storage: &Arc<StorageManager>) -> Self {
        Self {
            inner: Binding::mount(storage, keys::GAMIFICATION),
        }
    }

    pub fn get(&self) -> Option<GamificationState> {
        self.inner.get()
    }

    /// Apply `update` to the current state (or a fresh one) and store it.
    pub fn update<F: FnOnce(&mut GamificationState)>(&self, update: F) -> bool {
        let mut state = self.get().unwrap_or_default();
        update(&mut state);
        self.inner.storage().set_gamification(state)
    }

    /// Credit points for one action. No-op (`false`) without a record.
    pub fn add_points(&self, points: u64) -> bool {
        let Some(mut state) = self.get() else {
            return false;
        };
        state.add_points(points);
        self.inner.storage().set_gamification(state)
    }

    /// `false` without a record or if the badge is already held.
    pub fn add_achievement(&self, achievement: &str) -> bool {
        let Some(mut state) = self.get() else {
            return false;
        };
        state.add_achievement(achievement) && self.inner.storage().set_gamification(state)
    }

    /// `false` without a record or if the reward is already held.
    pub fn add_reward(&self, reward: &str) -> bool {
        let Some(mut state) = self.get() else {
            return false;
        };
        state.add_reward(reward) && self.inner.storage().set_gamification(state)
    }

    pub fn update_streak(&self, streak_days: u32) -> bool {
        let now = format_utc_rfc3339(self.inner.storage().clock().now());
        self.update(|state| state.update_streak(streak_days, &now))
    }

    pub fn binding(&self) -> &Binding<GamificationState> {
        &self.inner
    }
}

// ─── Cache ───────────────────────────────────────────────────

/// One entry of the shared TTL cache.
pub struct CacheBinding<T> {
    inner: Binding<CacheEntry>,
    cache_key: String,
    _value: std::marker::PhantomData<fn() -> T>,
}

impl<T> CacheBinding<T>
where
    T: DeserializeOwned + Serialize,
{
    pub fn mount(storage: &Arc<StorageManager>, cache_key: &str) -> Self {
        let lookup = cache_key.to_string();
        let inner = Binding::<CacheEntry>::mount_with(storage, keys::CACHE, move |document| {
            document
                .and_then(|doc| doc.get("data"))
                .and_then(|data| data.get(&lookup))
                .and_then(|entry| serde_json::from_value(entry.clone()).ok())
        });

        Self {
            inner,
            cache_key: cache_key.to_string(),
            _value: std::marker::PhantomData,
        }
    }

    /// Cached value, unless missing or expired.
    pub fn get(&self) -> Option<T> {
        let entry = self.inner.get()?;
        if entry.is_expired(self.inner.storage().clock().now_millis()) {
            return None;
        }
        serde_json::from_value(entry.value).ok()
    }

    pub fn set(&self, value: &T) -> bool {
        self.inner.storage().set_cache(&self.cache_key, value)
    }

    pub fn set_with_ttl(&self, value: &T, ttl: Duration) -> bool {
        self.inner
            .storage()
            .set_cache_with_ttl(&self.cache_key, value, ttl)
    }

    pub fn clear(&self) -> bool {
        self.inner.storage().remove_cache(&self.cache_key)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }
}

impl<T> std::fmt::Debug for CacheBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBinding")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct SessionBinding {
    inner: Binding<Session>,
    device_info: DeviceInfo,
}

impl SessionBinding {
    /// `device_info` is used when an update has to start a new session.
    pub fn mount(storage: &Arc<StorageManager>, device_info: DeviceInfo) -> Self {
        Self {
            inner: Binding::mount(storage, keys::SESSION),
            device_info,
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.inner.get()
    }

    /// Apply `update` to the current session, starting one if needed.
    pub fn update<F: FnOnce(&mut Session)>(&self, update: F) -> bool {
        let storage = self.inner.storage();
        let mut session = match self.get() {
            Some(session) => session,
            None => {
                let now = format_utc_rfc3339(storage.clock().now());
                match Session::start(self.device_info.clone(), &now) {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to start session");
                        return false;
                    }
                }
            }
        };
        update(&mut session);
        storage.set_session(session)
    }

    pub fn clear(&self) -> bool {
        self.inner.set(None)
    }

    pub fn binding(&self) -> &Binding<Session> {
        &self.inner
    }
}

// ─── Storage Info ────────────────────────────────────────────

/// Storage usage summary, recomputed whenever any key changes.
pub struct StorageInfoBinding {
    info: Arc<RwLock<StorageInfo>>,
    _subscription: Subscription,
}

impl StorageInfoBinding {
    pub fn mount(storage: &Arc<StorageManager>) -> Self {
        let info = Arc::new(RwLock::new(storage.info()));

        // Weak: the listener lives inside the manager.
        let weak: Weak<StorageManager> = Arc::downgrade(storage);
        let listener_info = info.clone();
        let subscription = storage.subscribe_any(move |_| {
            if let Some(storage) = weak.upgrade() {
                let fresh = storage.info();
                *listener_info.write().unwrap_or_else(|e| e.into_inner()) = fresh;
            }
        });

        Self {
            info,
            _subscription: subscription,
        }
    }

    pub fn get(&self) -> StorageInfo {
        self.info.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

// ─── Composite ───────────────────────────────────────────────

/// Every user-facing binding in one place.
pub struct AppStorage {
    storage: Arc<StorageManager>,
    pub user_type: UserTypeBinding,
    pub profile: ProfileBinding,
    pub preferences: PreferencesBinding,
    pub gamification: GamificationBinding,
    pub session: SessionBinding,
    pub chat_history: Binding<Vec<Value>>,
    pub audiovisual_submissions: Binding<Vec<Value>>,
    pub team_invites: Binding<Vec<Value>>,
    pub payment_history: Binding<Vec<Value>>,
    pub info: StorageInfoBinding,
}

impl AppStorage {
    pub fn mount(storage: &Arc<StorageManager>, device_info: DeviceInfo) -> Self {
        Self {
            storage: storage.clone(),
            user_type: UserTypeBinding::mount(storage),
            profile: ProfileBinding::mount(storage),
            preferences: PreferencesBinding::mount(storage),
            gamification: GamificationBinding::mount(storage),
            session: SessionBinding::mount(storage, device_info),
            chat_history: Binding::mount(storage, keys::CHAT_HISTORY),
            audiovisual_submissions: Binding::mount(storage, keys::AUDIOVISUAL_SUBMISSIONS),
            team_invites: Binding::mount(storage, keys::TEAM_INVITES),
            payment_history: Binding::mount(storage, keys::PAYMENT_HISTORY),
            info: StorageInfoBinding::mount(storage),
        }
    }

    /// Remove all user-scoped keys; the user type and preferences stay.
    pub fn clear_all_user_data(&self) -> WriteReport {
        self.storage.clear_user_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;
    use crate::store::MemoryStore;
    use crate::time_utils::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;

    fn storage() -> (Arc<ManualClock>, Arc<StorageManager>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let storage = StorageManager::with_clock(Arc::new(MemoryStore::new()), clock.clone());
        (clock, Arc::new(storage))
    }

    fn device() -> DeviceInfo {
        DeviceInfo::new("test-agent", "test", 390, 844)
    }

    #[test]
    fn test_binding_initialises_from_store() {
        let (_, storage) = storage();
        storage.set("k", &json!([1, 2]));

        let binding: Binding<Vec<u32>> = Binding::mount(&storage, "k");
        assert_eq!(binding.get(), Some(vec![1, 2]));
        assert_eq!(binding.generation(), 0);
    }

    #[test]
    fn test_binding_follows_writes_and_removal() {
        let (_, storage) = storage();
        let binding: Binding<String> = Binding::mount(&storage, "k");
        assert_eq!(binding.get(), None);

        storage.set("k", "v1");
        assert_eq!(binding.get().as_deref(), Some("v1"));

        assert!(binding.set(Some(&"v2".to_string())));
        assert_eq!(storage.get::<String>("k").as_deref(), Some("v2"));
        assert_eq!(binding.get().as_deref(), Some("v2"));

        assert!(binding.set(None));
        assert_eq!(binding.get(), None);
        assert_eq!(binding.generation(), 3);
    }

    #[test]
    fn test_dropping_binding_releases_listener() {
        let (_, storage) = storage();
        {
            let _a: Binding<String> = Binding::mount(&storage, "k");
            let _b: Binding<String> = Binding::mount(&storage, "k");
            assert_eq!(storage.events().listener_count("k"), 2);
        }
        assert_eq!(storage.events().listener_count("k"), 0);
    }

    #[test]
    fn test_observer_sees_changes() {
        let (_, storage) = storage();
        let binding: Binding<u32> = Binding::mount(&storage, "n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        binding.on_change(move |v| sink.lock().unwrap().push(v.copied()));

        storage.set("n", &1);
        storage.remove("n");
        assert_eq!(*seen.lock().unwrap(), vec![Some(1), None]);
    }

    #[test]
    fn test_user_type_binding_falls_back_to_publico() {
        let (_, storage) = storage();
        storage.set(keys::USER_TYPE, "hacker");

        let binding = UserTypeBinding::mount(&storage);
        assert_eq!(binding.get(), UserType::Publico);

        assert!(binding.set(UserType::Admin));
        assert_eq!(binding.get(), UserType::Admin);
        assert!(!binding.set_str("root"));
        assert_eq!(binding.get(), UserType::Admin);
    }

    #[test]
    fn test_profile_update_merges_into_existing() {
        let (_, storage) = storage();
        let binding = ProfileBinding::mount(&storage);

        assert!(binding.update(|p| p.uid = "u1".to_string()));
        assert!(binding.update(|p| p.display_name = "Ana".to_string()));

        let profile = binding.get().unwrap();
        assert_eq!(profile.uid, "u1");
        assert_eq!(profile.display_name, "Ana");
        assert_eq!(profile.updated_at, "2025-06-01T12:00:00.000Z");

        assert!(binding.clear());
        assert_eq!(binding.get(), None);
    }

    #[test]
    fn test_preferences_binding_updates_single_fields() {
        let (_, storage) = storage();
        let binding = PreferencesBinding::mount(&storage);
        assert_eq!(binding.get(), Preferences::default());

        binding.update_theme(Theme::Dark);
        binding.update_language(Language::EsEs);

        let prefs = storage.get_preferences();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.language, Language::EsEs);
        assert_eq!(prefs.notifications, NotificationSettings::default());
        assert_eq!(binding.get(), prefs);
    }

    #[test]
    fn test_gamification_binding_requires_record_for_points() {
        let (_, storage) = storage();
        let binding = GamificationBinding::mount(&storage);

        assert!(!binding.add_points(50));
        assert!(binding.update(|g| g.referral_code = "REF123".to_string()));

        assert!(binding.add_points(150));
        assert!(binding.add_achievement("first_blood"));
        assert!(!binding.add_achievement("first_blood"));
        assert!(binding.add_reward("badge_1"));
        assert!(binding.update_streak(3));

        let state = binding.get().unwrap();
        assert_eq!(state.points, 150);
        assert_eq!(state.total_actions, 1);
        assert_eq!(state.level(), Level::Bronze);
        assert_eq!(state.streak_days, 3);
        assert_eq!(state.referral_code, "REF123");
    }

    #[test]
    fn test_cache_binding_hides_expired_value() {
        let (clock, storage) = storage();
        let binding: CacheBinding<String> = CacheBinding::mount(&storage, "leaderboard");
        assert_eq!(binding.get(), None);

        assert!(binding.set_with_ttl(&"top10".to_string(), Duration::from_millis(500)));
        assert_eq!(binding.get().as_deref(), Some("top10"));

        clock.advance(chrono::Duration::milliseconds(501));
        assert_eq!(binding.get(), None);

        assert!(binding.set(&"fresh".to_string()));
        assert_eq!(binding.get().as_deref(), Some("fresh"));
        assert!(binding.clear());
        assert_eq!(binding.get(), None);
    }

    #[test]
    fn test_session_binding_starts_session_on_first_update() {
        let (_, storage) = storage();
        let binding = SessionBinding::mount(&storage, device());
        assert_eq!(binding.get(), None);

        assert!(binding.update(|_| {}));
        let first = binding.get().unwrap();
        assert_eq!(first.device_info.screen_size, "390x844");

        assert!(binding.update(|_| {}));
        assert_eq!(binding.get().unwrap().session_id, first.session_id);
    }

    #[test]
    fn test_storage_info_binding_tracks_any_change() {
        let (_, storage) = storage();
        let info = StorageInfoBinding::mount(&storage);
        assert_eq!(info.get().size, 0);

        storage.set("a", &1);
        storage.set("b", &2);
        assert_eq!(info.get().size, 2);

        storage.clear();
        assert_eq!(info.get().size, 0);
    }

    #[test]
    fn test_app_storage_clear_all_user_data() {
        let (_, storage) = storage();
        let app = AppStorage::mount(&storage, device());

        app.user_type.set(UserType::Atleta);
        app.profile.update(|p| p.uid = "u1".to_string());
        app.session.update(|_| {});
        app.chat_history.set(Some(&vec![json!({ "text": "oi" })]));
        app.preferences.update_theme(Theme::Light);

        let report = app.clear_all_user_data();
        assert!(report.is_success());

        assert_eq!(app.profile.get(), None);
        assert_eq!(app.session.get(), None);
        assert!(app.chat_history.get_or_default().is_empty());
        assert_eq!(app.user_type.get(), UserType::Atleta);
        assert_eq!(app.preferences.get().theme, Theme::Light);
    }

    #[test]
    fn test_dropping_app_storage_releases_every_listener() {
        let (_, storage) = storage();
        let app = AppStorage::mount(&storage, device());
        assert_eq!(storage.events().any_listener_count(), 1);

        drop(app);
        assert_eq!(storage.events().any_listener_count(), 0);
        for key in keys::ALL {
            assert_eq!(storage.events().listener_count(key), 0, "{key}");
        }
    }
}
