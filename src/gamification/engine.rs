//! Gamified-action orchestration.
//!
//! Sequences XP grant, streak update, badge evaluation, and mission
//! progress for each recorded activity. The XP grant is the only fatal
//! step: once it commits, later steps are best-effort and a failure in
//! one never rolls it back.

use std::sync::Arc;
use uuid::Uuid;

use super::badges::BadgeManager;
use super::streak::StreakManager;
use super::types::{ActivityType, AddXpResult, EarnedBadge};
use super::xp::{XpError, XpManager};
use crate::missions::manager::{MissionError, MissionManager};
use crate::missions::types::{Mission, UserMission};
use crate::storage::config::XpSettings;
use crate::storage::database::Database;

/// User-facing event produced by a gamified action, in display order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    XpGained {
        amount: u32,
        description: Option<String>,
    },
    LevelUp {
        new_level: u32,
    },
    BadgeUnlocked {
        name: String,
        icon: String,
        description: String,
    },
    MissionCompleted {
        name: String,
        icon: String,
        xp_reward: u32,
    },
}

/// Everything a recorded activity produced.
#[derive(Debug)]
pub struct ActivityOutcome {
    pub xp: AddXpResult,
    pub streak: Option<u32>,
    pub unlocked_badges: Vec<EarnedBadge>,
    pub completed_missions: Vec<(Mission, UserMission)>,
    pub notifications: Vec<Notification>,
}

/// Orchestrates the gamification managers over one database.
pub struct GamificationEngine {
    db: Arc<Database>,
    settings: XpSettings,
}

impl GamificationEngine {
    /// Create a new engine.
    pub fn new(db: Arc<Database>, settings: XpSettings) -> Self {
        Self { db, settings }
    }

    /// Record a gamified action for a user.
    ///
    /// Runs, in order: XP grant, streak update (for streak-qualifying
    /// activities), badge evaluation, mission progress. Only the grant
    /// can fail the call; downstream failures are logged and skipped, so
    /// the caller may see fewer notifications than expected but never a
    /// rolled-back grant.
    pub fn record_activity(
        &self,
        user_id: Uuid,
        activity: ActivityType,
        metadata: Option<serde_json::Value>,
    ) -> Result<ActivityOutcome, EngineError> {
        let conn = self.db.connection();
        let amount = self.settings.award_for(&activity);

        let xp = XpManager::new(conn).add_xp(user_id, amount, &activity, metadata)?;

        let mut notifications = vec![Notification::XpGained {
            amount,
            description: activity.description().map(str::to_string),
        }];
        if xp.level_up {
            notifications.push(Notification::LevelUp {
                new_level: xp.new_level,
            });
        }

        let streak = if activity.advances_streak() {
            match StreakManager::new(conn).update_streak(user_id) {
                Ok(streak) => Some(streak),
                Err(e) => {
                    tracing::warn!("Streak update failed for {}: {}", user_id, e);
                    None
                }
            }
        } else {
            None
        };

        let unlocked_badges = match BadgeManager::new(conn).check_and_unlock_badges(user_id) {
            Ok(badges) => badges,
            Err(e) => {
                tracing::warn!("Badge check failed for {}: {}", user_id, e);
                Vec::new()
            }
        };
        for earned in &unlocked_badges {
            notifications.push(Notification::BadgeUnlocked {
                name: earned.badge.name.clone(),
                icon: earned.badge.icon.clone(),
                description: earned.badge.description.clone(),
            });
        }

        let completed_missions = match activity.mission_requirement() {
            Some(requirement) => {
                match MissionManager::new(conn).update_mission_progress(user_id, requirement, 1) {
                    Ok(completed) => completed,
                    Err(e) => {
                        tracing::warn!("Mission progress failed for {}: {}", user_id, e);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };
        for (mission, _) in &completed_missions {
            notifications.push(Notification::MissionCompleted {
                name: mission.name.clone(),
                icon: mission.icon.clone(),
                xp_reward: mission.xp_reward,
            });
        }

        Ok(ActivityOutcome {
            xp,
            streak,
            unlocked_badges,
            completed_missions,
            notifications,
        })
    }

    /// Record the first login of the day.
    ///
    /// Returns `None` without any mutation when a login was already
    /// recorded today.
    pub fn record_daily_login(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ActivityOutcome>, EngineError> {
        let conn = self.db.connection();
        let today = chrono::Utc::now().date_naive();

        let already_logged: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM activity_log
                WHERE user_id = ?1 AND activity_type = ?2 AND activity_date = ?3)",
            rusqlite::params![
                user_id.to_string(),
                ActivityType::DailyLogin.as_str(),
                today.to_string(),
            ],
            |row| row.get(0),
        )?;
        if already_logged {
            return Ok(None);
        }

        self.record_activity(user_id, ActivityType::DailyLogin, None)
            .map(Some)
    }

    /// Make sure the user has current daily and weekly assignments.
    ///
    /// Idempotent while unexpired assignments exist. Returns the newly
    /// created assignments.
    pub fn ensure_missions_assigned(&self, user_id: Uuid) -> Result<Vec<UserMission>, EngineError> {
        let manager = MissionManager::new(self.db.connection());

        let mut assigned = manager.assign_daily_missions(user_id)?;
        assigned.extend(manager.assign_weekly_missions(user_id)?);

        Ok(assigned)
    }
}

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("XP grant failed: {0}")]
    XpGrant(#[from] XpError),

    #[error("Mission assignment failed: {0}")]
    Mission(#[from] MissionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GamificationEngine {
        let db = Arc::new(Database::open_in_memory().unwrap());
        GamificationEngine::new(db, XpSettings::default())
    }

    #[test]
    fn test_notifications_follow_the_grant_order() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        engine.ensure_missions_assigned(user_id).unwrap();
        let outcome = engine
            .record_activity(user_id, ActivityType::QuizCompleted, None)
            .unwrap();

        // XP first, then badge, then mission
        assert!(matches!(
            outcome.notifications[0],
            Notification::XpGained { amount: 30, .. }
        ));
        let badge_pos = outcome
            .notifications
            .iter()
            .position(|n| matches!(n, Notification::BadgeUnlocked { .. }));
        let mission_pos = outcome
            .notifications
            .iter()
            .position(|n| matches!(n, Notification::MissionCompleted { .. }));
        assert!(badge_pos.is_some());
        assert!(mission_pos.is_some());
        assert!(badge_pos < mission_pos);
    }

    #[test]
    fn test_quiz_updates_streak_and_missions() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        engine.ensure_missions_assigned(user_id).unwrap();
        let outcome = engine
            .record_activity(user_id, ActivityType::QuizCompleted, None)
            .unwrap();

        assert_eq!(outcome.streak, Some(1));
        // daily_quiz completes on the first quiz of the day
        assert!(outcome
            .completed_missions
            .iter()
            .any(|(m, _)| m.id == "daily_quiz"));
    }

    #[test]
    fn test_rewards_accumulate_on_the_ledger() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        engine.ensure_missions_assigned(user_id).unwrap();
        let outcome = engine
            .record_activity(user_id, ActivityType::QuizCompleted, None)
            .unwrap();

        let badge_xp: u32 = outcome
            .unlocked_badges
            .iter()
            .map(|e| e.badge.xp_reward)
            .sum();
        let mission_xp: u32 = outcome
            .completed_missions
            .iter()
            .map(|(m, _)| m.xp_reward)
            .sum();

        let conn = engine.db.connection();
        let ledger = XpManager::new(conn).get_user_xp(user_id).unwrap().unwrap();
        assert_eq!(ledger.total_xp, (30 + badge_xp + mission_xp) as i64);
    }

    #[test]
    fn test_daily_login_is_once_per_day() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        let first = engine.record_daily_login(user_id).unwrap();
        assert!(first.is_some());

        let second = engine.record_daily_login(user_id).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_mission_assignment_is_idempotent() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        let first = engine.ensure_missions_assigned(user_id).unwrap();
        assert!(!first.is_empty());

        let second = engine.ensure_missions_assigned(user_id).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_badge_reward_does_not_advance_streak() {
        assert!(ActivityType::QuizCompleted.advances_streak());
        assert!(ActivityType::DailyLogin.advances_streak());
        assert!(!ActivityType::BadgeUnlocked.advances_streak());
        assert!(!ActivityType::MissionCompleted.advances_streak());
    }
}
