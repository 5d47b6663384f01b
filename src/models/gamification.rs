// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! $BOX points, levels and achievements.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Level reached for a given number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Level {
    Iniciante,
    Bronze,
    Prata,
    Ouro,
    Platina,
    Diamante,
}

impl Level {
    /// Lowest to highest.
    pub const ALL: [Level; 6] = [
        Level::Iniciante,
        Level::Bronze,
        Level::Prata,
        Level::Ouro,
        Level::Platina,
        Level::Diamante,
    ];

    /// Points needed to reach this level.
    pub fn min_points(&self) -> u64 {
        match self {
            Level::Iniciante => 0,
            Level::Bronze => 100,
            Level::Prata => 300,
            Level::Ouro => 600,
            Level::Platina => 1000,
            Level::Diamante => 2000,
        }
    }

    pub fn from_points(points: u64) -> Self {
        Level::ALL
            .into_iter()
            .rev()
            .find(|level| points >= level.min_points())
            .unwrap_or(Level::Iniciante)
    }

    pub fn next(&self) -> Option<Level> {
        Level::ALL.into_iter().find(|level| level > self)
    }
}

/// A user's gamification record.
///
/// `level` is not a field: it is always computed from `points`. The stored
/// JSON still carries a `level` for the web client, written from the
/// computed value and ignored on read, so the two can never drift.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationState {
    pub points: u64,
    pub total_actions: u64,
    /// ISO 8601, stamped on every write
    pub last_action_at: String,
    pub achievements: BTreeSet<String>,
    pub rewards: BTreeSet<String>,
    pub streak_days: u32,
    pub last_login_streak: Option<String>,
    pub referral_code: String,
    pub referrals: Vec<String>,
    pub referral_points: u64,
}

impl Serialize for GamificationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Stored<'a> {
            points: u64,
            level: Level,
            total_actions: u64,
            last_action_at: &'a str,
            achievements: &'a BTreeSet<String>,
            rewards: &'a BTreeSet<String>,
            streak_days: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            last_login_streak: Option<&'a str>,
            referral_code: &'a str,
            referrals: &'a [String],
            referral_points: u64,
        }

        Stored {
            points: self.points,
            level: self.level(),
            total_actions: self.total_actions,
            last_action_at: &self.last_action_at,
            achievements: &self.achievements,
            rewards: &self.rewards,
            streak_days: self.streak_days,
            last_login_streak: self.last_login_streak.as_deref(),
            referral_code: &self.referral_code,
            referrals: &self.referrals,
            referral_points: self.referral_points,
        }
        .serialize(serializer)
    }
}

impl GamificationState {
    pub fn level(&self) -> Level {
        Level::from_points(self.points)
    }

    /// Points still needed for the next level; `None` at the top level.
    pub fn points_to_next_level(&self) -> Option<u64> {
        self.level()
            .next()
            .map(|next| next.min_points() - self.points)
    }

    /// Credit points for one action.
    pub fn add_points(&mut self, points: u64) {
        self.points = self.points.saturating_add(points);
        self.total_actions = self.total_actions.saturating_add(1);
    }

    /// Returns `false` if the badge was already earned.
    pub fn add_achievement(&mut self, achievement: impl Into<String>) -> bool {
        self.achievements.insert(achievement.into())
    }

    /// Returns `false` if the reward was already granted.
    pub fn add_reward(&mut self, reward: impl Into<String>) -> bool {
        self.rewards.insert(reward.into())
    }

    pub fn update_streak(&mut self, streak_days: u32, now: &str) {
        self.streak_days = streak_days;
        self.last_login_streak = Some(now.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_thresholds() {
        let cases = [
            (0, Level::Iniciante),
            (99, Level::Iniciante),
            (100, Level::Bronze),
            (299, Level::Bronze),
            (300, Level::Prata),
            (599, Level::Prata),
            (600, Level::Ouro),
            (999, Level::Ouro),
            (1000, Level::Platina),
            (1999, Level::Platina),
            (2000, Level::Diamante),
            (10000, Level::Diamante),
        ];
        for (points, level) in cases {
            assert_eq!(Level::from_points(points), level, "points = {points}");
        }
    }

    #[test]
    fn test_points_to_next_level() {
        let mut state = GamificationState::default();
        assert_eq!(state.points_to_next_level(), Some(100));

        state.add_points(250);
        assert_eq!(state.level(), Level::Bronze);
        assert_eq!(state.points_to_next_level(), Some(50));

        state.add_points(5000);
        assert_eq!(state.points_to_next_level(), None);
        assert_eq!(state.total_actions, 2);
    }

    #[test]
    fn test_stored_level_is_ignored_on_read() {
        // A record written with a level that disagrees with its points.
        let state: GamificationState = serde_json::from_value(json!({
            "points": 500,
            "level": "intermediário",
            "achievements": ["first_blood", "streak_7"],
        }))
        .unwrap();

        assert_eq!(state.level(), Level::Prata);
        assert_eq!(state.achievements.len(), 2);
    }

    #[test]
    fn test_serialized_level_matches_points() {
        let state = GamificationState {
            points: 1200,
            ..Default::default()
        };
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["level"], "platina");
        assert_eq!(value["totalActions"], 0);
        assert!(value.get("lastLoginStreak").is_none());
    }

    #[test]
    fn test_achievements_and_rewards_are_sets() {
        let mut state = GamificationState::default();
        assert!(state.add_achievement("first_blood"));
        assert!(!state.add_achievement("first_blood"));
        assert!(state.add_reward("badge_1"));
        assert!(!state.add_reward("badge_1"));
        assert_eq!(state.achievements.len(), 1);
    }

    #[test]
    fn test_negative_points_are_rejected() {
        let result = serde_json::from_value::<GamificationState>(json!({ "points": -5 }));
        assert!(result.is_err());
    }
}
