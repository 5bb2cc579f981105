//! XP ledger and leveling.
//!
//! The ledger row and its activity log entry are written in one
//! transaction so total_xp always audits against the log.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{ActivityLogEntry, ActivityType, AddXpResult, LeaderboardEntry, UserXp};

/// XP required to reach each level, for levels 1 through 8.
pub const LEVEL_THRESHOLDS: [i64; 8] = [0, 100, 300, 600, 1000, 1500, 2500, 5000];

/// Level for a total XP value.
///
/// Step function over `LEVEL_THRESHOLDS`: the largest level whose
/// threshold the total meets, capped at the top level.
pub fn level_for_xp(total_xp: i64) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| total_xp >= threshold)
        .map(|idx| idx as u32 + 1)
        .unwrap_or(1)
}

/// Manager for the per-user XP ledger.
pub struct XpManager<'a> {
    conn: &'a Connection,
}

impl<'a> XpManager<'a> {
    /// Create a new XP manager with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Grant XP to a user and append the matching activity log entry.
    ///
    /// The increment is evaluated in SQL (`total_xp = total_xp + ?`) so
    /// concurrent grants add instead of losing updates, and the ledger
    /// update and log insert commit together or not at all.
    pub fn add_xp(
        &self,
        user_id: Uuid,
        amount: u32,
        activity_type: &ActivityType,
        metadata: Option<serde_json::Value>,
    ) -> Result<AddXpResult, XpError> {
        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;

        ensure_ledger_row(&tx, user_id, now)?;

        let old_level: u32 = tx.query_row(
            "SELECT level FROM user_xp WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE user_xp SET total_xp = total_xp + ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id.to_string(), amount, now.to_rfc3339()],
        )?;

        let new_total_xp: i64 = tx.query_row(
            "SELECT total_xp FROM user_xp WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;

        let new_level = level_for_xp(new_total_xp);
        if new_level != old_level {
            tx.execute(
                "UPDATE user_xp SET level = ?2 WHERE user_id = ?1",
                params![user_id.to_string(), new_level],
            )?;
        }

        tx.execute(
            "INSERT INTO activity_log (id, user_id, activity_type, xp_earned, activity_date, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                activity_type.as_str(),
                amount,
                now.date_naive().to_string(),
                metadata.as_ref().map(|m| m.to_string()),
                now.to_rfc3339(),
            ],
        )?;

        tx.commit()?;

        Ok(AddXpResult {
            new_total_xp,
            new_level,
            level_up: new_level > old_level,
        })
    }

    /// Get the ledger row for a user, if one exists.
    pub fn get_user_xp(&self, user_id: Uuid) -> Result<Option<UserXp>, XpError> {
        self.conn
            .query_row(
                "SELECT user_id, total_xp, level, current_streak, longest_streak,
                        last_activity_date, created_at, updated_at
                 FROM user_xp WHERE user_id = ?1",
                params![user_id.to_string()],
                parse_user_xp_row,
            )
            .optional()
            .map_err(XpError::from)
    }

    /// Top users by total XP.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, XpError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, total_xp, level FROM user_xp ORDER BY total_xp DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let user_id_str: String = row.get(0)?;
            Ok(LeaderboardEntry {
                user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
                total_xp: row.get(1)?,
                level: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(XpError::from)
    }

    /// Latest activity log entries for a user, newest first.
    pub fn recent_activity(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, XpError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, activity_type, xp_earned, activity_date, metadata, created_at
             FROM activity_log
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id.to_string(), limit], parse_activity_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(XpError::from)
    }
}

/// Create the ledger row for a user if it does not exist yet. Safe to repeat.
pub(crate) fn ensure_ledger_row(
    conn: &Connection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_xp
         (id, user_id, total_xp, level, current_streak, longest_streak, last_activity_date, created_at, updated_at)
         VALUES (?1, ?2, 0, 1, 0, 0, NULL, ?3, ?3)",
        params![
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Parse a database row into a UserXp.
fn parse_user_xp_row(row: &rusqlite::Row) -> rusqlite::Result<UserXp> {
    let user_id_str: String = row.get(0)?;
    let last_activity_str: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(UserXp {
        user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
        total_xp: row.get(1)?,
        level: row.get(2)?,
        current_streak: row.get(3)?,
        longest_streak: row.get(4)?,
        last_activity_date: last_activity_str
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Parse a database row into an ActivityLogEntry.
fn parse_activity_row(row: &rusqlite::Row) -> rusqlite::Result<ActivityLogEntry> {
    let id_str: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let activity_str: String = row.get(2)?;
    let date_str: String = row.get(4)?;
    let metadata_str: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(ActivityLogEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
        activity_type: ActivityType::parse(&activity_str),
        xp_earned: row.get(3)?,
        activity_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| Utc::now().date_naive()),
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// XP ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum XpError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}
