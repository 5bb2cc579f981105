//! Daily streak tracking.

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::xp::ensure_ledger_row;

/// Manager for per-user daily streaks.
pub struct StreakManager<'a> {
    conn: &'a Connection,
}

impl<'a> StreakManager<'a> {
    /// Create a new streak manager with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Update the streak for the current calendar day.
    pub fn update_streak(&self, user_id: Uuid) -> Result<u32, StreakError> {
        self.update_streak_on(user_id, Utc::now().date_naive())
    }

    /// Update the streak as of the given day.
    ///
    /// Same day keeps the streak, the next day extends it by one, any
    /// longer gap resets it to 1. Idempotent within a calendar day.
    pub fn update_streak_on(&self, user_id: Uuid, today: NaiveDate) -> Result<u32, StreakError> {
        let now = Utc::now();
        ensure_ledger_row(self.conn, user_id, now)?;

        let (current, longest, last_str): (u32, u32, Option<String>) = self.conn.query_row(
            "SELECT current_streak, longest_streak, last_activity_date
             FROM user_xp WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let last_date = last_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

        let new_streak = match last_date {
            Some(date) if date == today => current,
            Some(date) if today - date == Duration::days(1) => current + 1,
            _ => 1,
        };
        let new_longest = longest.max(new_streak);

        self.conn.execute(
            "UPDATE user_xp SET current_streak = ?2, longest_streak = ?3,
                    last_activity_date = ?4, updated_at = ?5
             WHERE user_id = ?1",
            params![
                user_id.to_string(),
                new_streak,
                new_longest,
                today.to_string(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(new_streak)
    }
}

/// Streak errors.
#[derive(Debug, thiserror::Error)]
pub enum StreakError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}
