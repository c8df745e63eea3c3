//! Actor profile - durable gamification state for one identity
//!
//! Every mutation goes through this module so the derived fields stay
//! consistent: `level == xp / level_xp_unit + 1` and `completed_event_ids`
//! only ever grows.

use crate::levels::level_for_xp;
use crate::types::{AchievementEvent, ActorIdentity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub identity: ActorIdentity,
    pub xp: u64,
    pub coins: u64,
    pub level: u64,
    #[serde(default)]
    pub completed_event_ids: BTreeSet<String>,
    #[serde(default)]
    pub streak: u64,
    /// Calendar day of the last rewarded event
    #[serde(default)]
    pub last_active_day: Option<NaiveDate>,
}

/// Aggregate fields written to the remote store on replication.
///
/// Values are absolute, never increments, so replaying an update is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub xp: u64,
    pub coins: u64,
    pub level: u64,
    pub streak: u64,
    pub completed_event_ids: BTreeSet<String>,
    pub last_active_day: Option<NaiveDate>,
}

impl ActorProfile {
    /// Fresh profile for a never-seen identity
    pub fn new(identity: ActorIdentity, starting_coins: u64) -> Self {
        Self {
            identity,
            xp: 0,
            coins: starting_coins,
            level: 1,
            completed_event_ids: BTreeSet::new(),
            streak: 0,
            last_active_day: None,
        }
    }

    pub fn has_completed(&self, event_id: &str) -> bool {
        self.completed_event_ids.contains(event_id)
    }

    /// Apply an event's rewards once.
    ///
    /// Returns false (and leaves the profile untouched) if the event was
    /// already completed.
    pub fn apply_event(
        &mut self,
        event: &AchievementEvent,
        today: NaiveDate,
        level_xp_unit: u64,
    ) -> bool {
        if self.has_completed(&event.event_id) {
            return false;
        }

        self.xp = self.xp.saturating_add(event.xp_reward);
        self.coins = self.coins.saturating_add(event.coins_reward);
        self.level = level_for_xp(self.xp, level_xp_unit);
        self.completed_event_ids.insert(event.event_id.clone());
        self.touch_streak(today);
        true
    }

    fn touch_streak(&mut self, today: NaiveDate) {
        self.streak = match self.last_active_day {
            Some(day) if day == today => self.streak.max(1),
            Some(day) if day.succ_opt() == Some(today) => self.streak + 1,
            Some(day) if day > today => self.streak,
            _ => 1,
        };
        if self.last_active_day.map_or(true, |day| day < today) {
            self.last_active_day = Some(today);
        }
    }

    /// Fold another snapshot of the same actor into this one.
    ///
    /// Completed events are unioned and counters take the larger value, so
    /// nothing recorded on either side is lost. Identity stays as-is.
    /// Returns true if anything changed.
    pub fn merge_from(&mut self, other: &ActorProfile, level_xp_unit: u64) -> bool {
        let before = self.clone();

        self.xp = self.xp.max(other.xp);
        self.coins = self.coins.max(other.coins);
        self.streak = self.streak.max(other.streak);
        self.last_active_day = self.last_active_day.max(other.last_active_day);
        self.completed_event_ids
            .extend(other.completed_event_ids.iter().cloned());
        self.level = level_for_xp(self.xp, level_xp_unit);

        *self != before
    }

    /// Fold a different actor's progress into this one (guest upgrade).
    ///
    /// Per-event rewards are not stored, so the other actor's totals are
    /// added only when its events are disjoint from ours: all of its xp and
    /// the coins it earned above `starting_coins`. If the event sets overlap
    /// the shared rewards cannot be separated out, and counters take the
    /// larger value as in `merge_from`. Returns true if anything changed.
    pub fn absorb(&mut self, other: &ActorProfile, starting_coins: u64, level_xp_unit: u64) -> bool {
        let disjoint = other
            .completed_event_ids
            .iter()
            .all(|id| !self.completed_event_ids.contains(id));
        if !disjoint {
            return self.merge_from(other, level_xp_unit);
        }

        let before = self.clone();
        self.xp = self.xp.saturating_add(other.xp);
        self.coins = self
            .coins
            .saturating_add(other.coins.saturating_sub(starting_coins));
        self.streak = self.streak.max(other.streak);
        self.last_active_day = self.last_active_day.max(other.last_active_day);
        self.completed_event_ids
            .extend(other.completed_event_ids.iter().cloned());
        self.level = level_for_xp(self.xp, level_xp_unit);

        *self != before
    }

    /// Check the level derivation invariant
    pub fn level_is_consistent(&self, level_xp_unit: u64) -> bool {
        self.level == level_for_xp(self.xp, level_xp_unit)
    }

    pub fn fields(&self) -> ProfileFields {
        ProfileFields {
            xp: self.xp,
            coins: self.coins,
            level: self.level,
            streak: self.streak,
            completed_event_ids: self.completed_event_ids.clone(),
            last_active_day: self.last_active_day,
        }
    }

    /// Overwrite aggregate fields, as the remote store does on update
    pub fn apply_fields(&mut self, fields: &ProfileFields) {
        self.xp = fields.xp;
        self.coins = fields.coins;
        self.level = fields.level;
        self.streak = fields.streak;
        self.completed_event_ids = fields.completed_event_ids.clone();
        self.last_active_day = fields.last_active_day;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn fresh() -> ActorProfile {
        ActorProfile::new(ActorIdentity::guest("guest_1"), 100)
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_event_rewards() {
        let mut profile = fresh();
        let applied = profile.apply_event(&AchievementEvent::new("t6", 50, 20), day(1), 500);

        assert!(applied);
        assert_eq!(profile.xp, 50);
        assert_eq!(profile.coins, 120);
        assert_eq!(profile.level, 1);
        assert!(profile.has_completed("t6"));
    }

    #[test]
    fn test_apply_event_twice_is_noop() {
        let mut profile = fresh();
        let event = AchievementEvent::new("t6", 50, 20);
        profile.apply_event(&event, day(1), 500);
        let once = profile.clone();

        assert!(!profile.apply_event(&event, day(2), 500));
        assert_eq!(profile, once);
    }

    #[test]
    fn test_level_up_crosses_unit() {
        let mut profile = fresh();
        profile.apply_event(&AchievementEvent::new("a", 480, 0), day(1), 500);
        profile.apply_event(&AchievementEvent::new("b", 40, 0), day(1), 500);
        assert_eq!(profile.xp, 520);
        assert_eq!(profile.level, 2);
        assert!(profile.level_is_consistent(500));
    }

    #[test]
    fn test_streak_progression() {
        let mut profile = fresh();
        profile.apply_event(&AchievementEvent::new("a", 1, 0), day(1), 500);
        assert_eq!(profile.streak, 1);

        profile.apply_event(&AchievementEvent::new("b", 1, 0), day(1), 500);
        assert_eq!(profile.streak, 1);

        profile.apply_event(&AchievementEvent::new("c", 1, 0), day(2), 500);
        assert_eq!(profile.streak, 2);

        profile.apply_event(&AchievementEvent::new("d", 1, 0), day(5), 500);
        assert_eq!(profile.streak, 1);
        assert_eq!(profile.last_active_day, Some(day(5)));
    }

    #[test]
    fn test_merge_unions_events_and_takes_larger_counters() {
        let mut local = fresh();
        local.completed_event_ids = ["A", "B"].iter().map(|s| s.to_string()).collect();
        local.xp = 700;
        local.coins = 90;

        let mut remote = fresh();
        remote.completed_event_ids = ["B", "C"].iter().map(|s| s.to_string()).collect();
        remote.xp = 300;
        remote.coins = 250;

        assert!(remote.merge_from(&local, 500));

        let expected: BTreeSet<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(remote.completed_event_ids, expected);
        assert_eq!(remote.xp, 700);
        assert_eq!(remote.coins, 250);
        assert_eq!(remote.level, 2);
    }

    #[test]
    fn test_absorb_adds_disjoint_guest_progress() {
        let mut host = ActorProfile::new(ActorIdentity::guest("host"), 100);
        host.xp = 500;
        host.level = 2;
        host.completed_event_ids = ids(&["h1"]);

        let mut guest = ActorProfile::new(ActorIdentity::guest("guest_1"), 100);
        guest.xp = 120;
        guest.coins = 130;
        guest.completed_event_ids = ids(&["g1", "g2"]);

        assert!(host.absorb(&guest, 100, 500));
        assert_eq!(host.xp, 620);
        assert_eq!(host.coins, 130);
        assert_eq!(host.level, 2);
        assert_eq!(host.completed_event_ids, ids(&["g1", "g2", "h1"]));
        assert_eq!(host.identity.id, "host");
    }

    #[test]
    fn test_absorb_overlapping_events_takes_larger_counters() {
        let mut host = ActorProfile::new(ActorIdentity::guest("host"), 100);
        host.xp = 500;
        host.level = 2;
        host.completed_event_ids = ids(&["shared"]);

        let mut guest = ActorProfile::new(ActorIdentity::guest("guest_1"), 100);
        guest.xp = 120;
        guest.completed_event_ids = ids(&["shared", "g1"]);

        assert!(host.absorb(&guest, 100, 500));
        assert_eq!(host.xp, 500);
        assert_eq!(host.completed_event_ids, ids(&["g1", "shared"]));
    }

    #[test]
    fn test_merge_identical_reports_unchanged() {
        let mut a = fresh();
        let b = a.clone();
        assert!(!a.merge_from(&b, 500));
    }

    #[test]
    fn test_profile_deserializes_without_optional_fields() {
        let json = r#"{
            "identity": {"id": "7", "source_kind": "HOST_PLATFORM", "display_name": "Sam", "avatar_ref": null},
            "xp": 10, "coins": 5, "level": 1
        }"#;
        let profile: ActorProfile = serde_json::from_str(json).unwrap();
        assert!(profile.completed_event_ids.is_empty());
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.last_active_day, None);
    }
}
