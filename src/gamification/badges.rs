//! Badge catalog and unlock evaluation.
//!
//! Badge rewards flow back through [`XpManager::add_xp`] so leveling
//! rules stay in one place.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{
    default_badges, ActivityType, Badge, BadgeCategory, EarnedBadge, RequirementType,
};
use super::xp::{XpError, XpManager};

/// Badge manager.
pub struct BadgeManager<'a> {
    conn: &'a Connection,
}

impl<'a> BadgeManager<'a> {
    /// Create a new badge manager with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Seed the default badge catalog if not present. Safe to repeat.
    pub fn initialize_badges(&self) -> Result<(), BadgeError> {
        let now = Utc::now().to_rfc3339();

        for badge in default_badges() {
            self.conn.execute(
                "INSERT OR IGNORE INTO badges
                 (id, name, description, icon, category, requirement_type, requirement_value, xp_reward, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    badge.id,
                    badge.name,
                    badge.description,
                    badge.icon,
                    badge.category.as_str(),
                    badge.requirement_type.as_str(),
                    badge.requirement_value,
                    badge.xp_reward,
                    now,
                ],
            )?;
        }

        Ok(())
    }

    /// Get all badges in the catalog.
    pub fn get_all_badges(&self) -> Result<Vec<Badge>, BadgeError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, icon, category, requirement_type, requirement_value, xp_reward
             FROM badges",
        )?;

        let rows = stmt.query_map([], parse_badge_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(BadgeError::from)
    }

    /// Get badges unlocked by a user, newest first.
    pub fn get_earned_badges(&self, user_id: Uuid) -> Result<Vec<EarnedBadge>, BadgeError> {
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.name, b.description, b.icon, b.category, b.requirement_type,
                    b.requirement_value, b.xp_reward, ub.unlocked_at
             FROM badges b
             JOIN user_badges ub ON b.id = ub.badge_id
             WHERE ub.user_id = ?1
             ORDER BY ub.unlocked_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            let badge = parse_badge_row(row)?;
            let unlocked_str: String = row.get(8)?;
            Ok((badge, unlocked_str))
        })?;

        let mut earned = Vec::new();
        for row in rows {
            let (badge, unlocked_str) = row?;
            earned.push(EarnedBadge {
                badge,
                unlocked_at: DateTime::parse_from_rfc3339(&unlocked_str)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            });
        }

        Ok(earned)
    }

    /// Aggregate the stats badge requirements are evaluated against.
    pub fn user_stats(&self, user_id: Uuid) -> Result<UserStats, BadgeError> {
        let ledger: Option<(i64, u32)> = self
            .conn
            .query_row(
                "SELECT total_xp, longest_streak FROM user_xp WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (total_xp, longest_streak) = ledger.unwrap_or((0, 0));

        Ok(UserStats {
            total_xp,
            longest_streak,
            quizzes_completed: self.count_activities(user_id, &ActivityType::QuizCompleted)?,
            perfect_quizzes: self.count_activities(user_id, &ActivityType::QuizPerfect)?,
            materials_read: self.count_activities(user_id, &ActivityType::MaterialRead)?,
            login_days: self.count_login_days(user_id)?,
            classes_joined: self.count_activities(user_id, &ActivityType::Enrolled)?,
        })
    }

    /// Unlock every badge whose requirement the user now meets.
    ///
    /// Already-unlocked badges are skipped, so a second call with no new
    /// activity returns an empty list. Returns the full badge records for
    /// the caller to render, one per badge, in unlock order.
    pub fn check_and_unlock_badges(&self, user_id: Uuid) -> Result<Vec<EarnedBadge>, BadgeError> {
        let stats = self.user_stats(user_id)?;
        let earned_ids: Vec<String> = self
            .get_earned_badges(user_id)?
            .iter()
            .map(|e| e.badge.id.clone())
            .collect();

        let mut newly_earned = Vec::new();

        for badge in self.get_all_badges()? {
            if earned_ids.contains(&badge.id) {
                continue;
            }

            if stats.aggregate_for(badge.requirement_type) >= badge.requirement_value {
                let earned = self.unlock_badge(user_id, &badge)?;
                newly_earned.push(earned);
            }
        }

        Ok(newly_earned)
    }

    /// Unlock a badge for a user and grant its XP reward.
    fn unlock_badge(&self, user_id: Uuid, badge: &Badge) -> Result<EarnedBadge, BadgeError> {
        let now = Utc::now();

        self.conn.execute(
            "INSERT INTO user_badges (id, user_id, badge_id, unlocked_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                badge.id,
                now.to_rfc3339(),
            ],
        )?;

        if badge.xp_reward > 0 {
            XpManager::new(self.conn).add_xp(
                user_id,
                badge.xp_reward,
                &ActivityType::BadgeUnlocked,
                Some(serde_json::json!({
                    "badge_id": badge.id,
                    "badge_name": badge.name,
                })),
            )?;
        }

        Ok(EarnedBadge {
            badge: badge.clone(),
            unlocked_at: now,
        })
    }

    fn count_activities(&self, user_id: Uuid, activity: &ActivityType) -> Result<i64, BadgeError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM activity_log WHERE user_id = ?1 AND activity_type = ?2",
            params![user_id.to_string(), activity.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Logins are counted per day, not per log row.
    fn count_login_days(&self, user_id: Uuid) -> Result<i64, BadgeError> {
        let count = self.conn.query_row(
            "SELECT COUNT(DISTINCT activity_date) FROM activity_log
             WHERE user_id = ?1 AND activity_type = ?2",
            params![user_id.to_string(), ActivityType::DailyLogin.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Parse a database row into a Badge. The first eight columns must be the
/// badge columns in catalog order.
fn parse_badge_row(row: &rusqlite::Row) -> rusqlite::Result<Badge> {
    let category_str: String = row.get(4)?;
    let requirement_str: String = row.get(5)?;

    Ok(Badge {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        category: BadgeCategory::from_str(&category_str).unwrap_or(BadgeCategory::Special),
        requirement_type: RequirementType::from_str(&requirement_str)
            .unwrap_or(RequirementType::EarnTotalXp),
        requirement_value: row.get(6)?,
        xp_reward: row.get(7)?,
    })
}

/// Aggregated user stats for badge evaluation.
#[derive(Debug, Clone, Default)]
pub struct UserStats {
    pub total_xp: i64,
    pub longest_streak: u32,
    pub quizzes_completed: i64,
    pub perfect_quizzes: i64,
    pub materials_read: i64,
    pub login_days: i64,
    pub classes_joined: i64,
}

impl UserStats {
    /// The aggregate a requirement type measures.
    pub fn aggregate_for(&self, requirement: RequirementType) -> i64 {
        match requirement {
            RequirementType::CompleteQuizzes => self.quizzes_completed,
            RequirementType::PerfectQuizzes => self.perfect_quizzes,
            RequirementType::ReadMaterials => self.materials_read,
            RequirementType::DailyLogin => self.login_days,
            RequirementType::JoinClasses => self.classes_joined,
            RequirementType::EarnTotalXp => self.total_xp,
            // Once reached, a streak badge keeps qualifying
            RequirementType::ReachStreak => self.longest_streak as i64,
        }
    }
}

/// Badge errors.
#[derive(Debug, thiserror::Error)]
pub enum BadgeError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("XP grant failed: {0}")]
    XpGrant(#[from] XpError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[test]
    fn test_catalog_is_seeded() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());

        let badges = manager.get_all_badges().unwrap();
        assert_eq!(badges.len(), default_badges().len());
    }

    #[test]
    fn test_first_quiz_unlocks_badge() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());
        let xp = XpManager::new(db.connection());
        let user_id = Uuid::new_v4();

        xp.add_xp(user_id, 30, &ActivityType::QuizCompleted, None)
            .unwrap();

        let unlocked = manager.check_and_unlock_badges(user_id).unwrap();
        let ids: Vec<&str> = unlocked.iter().map(|e| e.badge.id.as_str()).collect();
        assert!(ids.contains(&"first_quiz"));
    }

    #[test]
    fn test_second_call_returns_empty() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());
        let xp = XpManager::new(db.connection());
        let user_id = Uuid::new_v4();

        xp.add_xp(user_id, 30, &ActivityType::QuizCompleted, None)
            .unwrap();

        let first = manager.check_and_unlock_badges(user_id).unwrap();
        assert!(!first.is_empty());

        let second = manager.check_and_unlock_badges(user_id).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_reward_flows_through_ledger() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());
        let xp = XpManager::new(db.connection());
        let user_id = Uuid::new_v4();

        xp.add_xp(user_id, 30, &ActivityType::QuizCompleted, None)
            .unwrap();
        let unlocked = manager.check_and_unlock_badges(user_id).unwrap();
        assert_eq!(unlocked.len(), 1);

        // 30 for the quiz plus the first_quiz reward, via an audited
        // badge_unlocked log entry
        let ledger = xp.get_user_xp(user_id).unwrap().unwrap();
        assert_eq!(ledger.total_xp, 30 + unlocked[0].badge.xp_reward as i64);

        let entries = xp.recent_activity(user_id, 10).unwrap();
        assert!(entries
            .iter()
            .any(|e| e.activity_type == ActivityType::BadgeUnlocked));
    }

    #[test]
    fn test_no_duplicate_user_badge_rows() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());
        let xp = XpManager::new(db.connection());
        let user_id = Uuid::new_v4();

        xp.add_xp(user_id, 30, &ActivityType::QuizCompleted, None)
            .unwrap();
        manager.check_and_unlock_badges(user_id).unwrap();
        manager.check_and_unlock_badges(user_id).unwrap();

        let rows: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM user_badges WHERE user_id = ?1 AND badge_id = 'first_quiz'",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_streak_badge_uses_longest_streak() {
        let db = Database::open_in_memory().unwrap();
        let manager = BadgeManager::new(db.connection());
        let user_id = Uuid::new_v4();

        // Streak of 7 reached earlier, currently back at 1
        let now = Utc::now().to_rfc3339();
        db.connection()
            .execute(
                "INSERT INTO user_xp (id, user_id, total_xp, level, current_streak, longest_streak, last_activity_date, created_at, updated_at)
                 VALUES (?1, ?2, 0, 1, 1, 7, NULL, ?3, ?3)",
                params![Uuid::new_v4().to_string(), user_id.to_string(), now],
            )
            .unwrap();

        let unlocked = manager.check_and_unlock_badges(user_id).unwrap();
        let ids: Vec<&str> = unlocked.iter().map(|e| e.badge.id.as_str()).collect();
        assert!(ids.contains(&"week_streak"));
    }
}
