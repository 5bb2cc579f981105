//! Mission assignment and progress tracking.
//!
//! Mission rewards flow back through [`XpManager::add_xp`] so leveling
//! rules stay in one place.

use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, Connection};
use uuid::Uuid;

use super::types::{default_missions, Mission, MissionType, UserMission};
use crate::gamification::types::{ActivityType, BadgeCategory, RequirementType};
use crate::gamification::xp::{XpError, XpManager};

/// Expired state is derived, never stored: an assignment is unexpired
/// while `expires_at` is still in the future. Every query that cares
/// about expiry uses this fragment with a `:now` parameter.
const UNEXPIRED: &str = "um.expires_at > :now";

const ASSIGNMENT_COLUMNS: &str = "m.id, m.name, m.description, m.mission_type, m.category,
        m.requirement_type, m.requirement_value, m.xp_reward, m.icon, m.is_active,
        um.id, um.user_id, um.mission_id, um.progress, um.completed,
        um.completed_at, um.expires_at, um.created_at";

/// Mission manager.
pub struct MissionManager<'a> {
    conn: &'a Connection,
}

impl<'a> MissionManager<'a> {
    /// Create a new mission manager with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Seed the default mission catalog if not present. Safe to repeat.
    pub fn initialize_missions(&self) -> Result<(), MissionError> {
        let now = Utc::now().to_rfc3339();

        for mission in default_missions() {
            self.conn.execute(
                "INSERT OR IGNORE INTO missions
                 (id, name, description, mission_type, category, requirement_type,
                  requirement_value, xp_reward, icon, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    mission.id,
                    mission.name,
                    mission.description,
                    mission.mission_type.as_str(),
                    mission.category.as_str(),
                    mission.requirement_type.as_str(),
                    mission.requirement_value,
                    mission.xp_reward,
                    mission.icon,
                    mission.is_active,
                    now,
                ],
            )?;
        }

        Ok(())
    }

    /// Assign the active daily missions, expiring in 24 hours.
    pub fn assign_daily_missions(&self, user_id: Uuid) -> Result<Vec<UserMission>, MissionError> {
        self.assign_missions(user_id, MissionType::Daily)
    }

    /// Assign the active weekly missions, expiring in 7 days.
    pub fn assign_weekly_missions(&self, user_id: Uuid) -> Result<Vec<UserMission>, MissionError> {
        self.assign_missions(user_id, MissionType::Weekly)
    }

    /// Assign the catalog missions of one cadence to a user.
    ///
    /// No-op while the user still has an unexpired assignment of that
    /// cadence; once those expire the next call re-assigns.
    fn assign_missions(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> Result<Vec<UserMission>, MissionError> {
        let now = Utc::now();

        let exists_sql = format!(
            "SELECT EXISTS(
                SELECT 1 FROM user_missions um
                JOIN missions m ON um.mission_id = m.id
                WHERE um.user_id = :user AND m.mission_type = :mission_type AND {UNEXPIRED})"
        );
        let already_assigned: bool = self.conn.query_row(
            &exists_sql,
            named_params! {
                ":user": user_id.to_string(),
                ":mission_type": mission_type.as_str(),
                ":now": now.to_rfc3339(),
            },
            |row| row.get(0),
        )?;
        if already_assigned {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT id FROM missions WHERE mission_type = ?1 AND is_active = 1",
        )?;
        let mission_ids = stmt
            .query_map(params![mission_type.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let expires_at = now + mission_type.duration();
        let mut assigned = Vec::new();

        for mission_id in mission_ids {
            let assignment = UserMission {
                id: Uuid::new_v4(),
                user_id,
                mission_id,
                progress: 0,
                completed: false,
                completed_at: None,
                expires_at,
                created_at: now,
            };

            self.conn.execute(
                "INSERT INTO user_missions
                 (id, user_id, mission_id, progress, completed, completed_at, expires_at, created_at)
                 VALUES (?1, ?2, ?3, 0, 0, NULL, ?4, ?5)",
                params![
                    assignment.id.to_string(),
                    assignment.user_id.to_string(),
                    assignment.mission_id,
                    assignment.expires_at.to_rfc3339(),
                    assignment.created_at.to_rfc3339(),
                ],
            )?;

            assigned.push(assignment);
        }

        Ok(assigned)
    }

    /// Unexpired assignments with their catalog missions, soonest expiry first.
    pub fn get_active_missions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(Mission, UserMission)>, MissionError> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS}
             FROM user_missions um
             JOIN missions m ON um.mission_id = m.id
             WHERE um.user_id = :user AND {UNEXPIRED}
             ORDER BY um.expires_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt.query_map(
            named_params! {
                ":user": user_id.to_string(),
                ":now": Utc::now().to_rfc3339(),
            },
            parse_assignment_row,
        )?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(MissionError::from)
    }

    /// Advance every matching active assignment and complete the ones
    /// that reach their requirement.
    ///
    /// The increment is evaluated in SQL (`progress = progress + ?`) and
    /// the completion flip is guarded by `completed = 0`, so an
    /// assignment completes and is rewarded at most once. An assignment
    /// already at or past its requirement is left alone. Returns the
    /// newly completed assignments.
    pub fn update_mission_progress(
        &self,
        user_id: Uuid,
        requirement_type: RequirementType,
        increment: u32,
    ) -> Result<Vec<(Mission, UserMission)>, MissionError> {
        let now = Utc::now();

        let matching_sql = format!(
            "SELECT um.id, m.requirement_value, um.progress
             FROM user_missions um
             JOIN missions m ON um.mission_id = m.id
             WHERE um.user_id = :user AND m.requirement_type = :requirement
               AND um.completed = 0 AND {UNEXPIRED}"
        );
        let mut stmt = self.conn.prepare(&matching_sql)?;
        let matching = stmt
            .query_map(
                named_params! {
                    ":user": user_id.to_string(),
                    ":requirement": requirement_type.as_str(),
                    ":now": now.to_rfc3339(),
                },
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut completed = Vec::new();

        for (assignment_id, requirement_value, progress_before) in matching {
            if progress_before >= requirement_value {
                // Tolerated anomaly: already satisfied, never re-rewarded
                continue;
            }

            self.conn.execute(
                "UPDATE user_missions SET progress = progress + ?2 WHERE id = ?1 AND completed = 0",
                params![assignment_id, increment],
            )?;

            let new_progress: i64 = self.conn.query_row(
                "SELECT progress FROM user_missions WHERE id = ?1",
                params![assignment_id],
                |row| row.get(0),
            )?;

            if new_progress >= requirement_value {
                let flipped = self.conn.execute(
                    "UPDATE user_missions SET completed = 1, completed_at = ?2
                     WHERE id = ?1 AND completed = 0",
                    params![assignment_id, now.to_rfc3339()],
                )?;

                if flipped == 1 {
                    let (mission, assignment) = self.get_assignment(&assignment_id)?;

                    if mission.xp_reward > 0 {
                        XpManager::new(self.conn).add_xp(
                            user_id,
                            mission.xp_reward,
                            &ActivityType::MissionCompleted,
                            Some(serde_json::json!({
                                "mission_id": mission.id,
                                "mission_name": mission.name,
                            })),
                        )?;
                    }

                    completed.push((mission, assignment));
                }
            }
        }

        Ok(completed)
    }

    /// An assignment with its catalog mission, by assignment id.
    fn get_assignment(&self, assignment_id: &str) -> Result<(Mission, UserMission), MissionError> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS}
             FROM user_missions um
             JOIN missions m ON um.mission_id = m.id
             WHERE um.id = ?1"
        );
        self.conn
            .query_row(&sql, params![assignment_id], parse_assignment_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    MissionError::NotFound(assignment_id.to_string())
                }
                other => MissionError::from(other),
            })
    }
}

/// Parse an `ASSIGNMENT_COLUMNS` row into a mission and its assignment.
fn parse_assignment_row(row: &rusqlite::Row) -> rusqlite::Result<(Mission, UserMission)> {
    let mission_type_str: String = row.get(3)?;
    let category_str: String = row.get(4)?;
    let requirement_str: String = row.get(5)?;
    let assignment_id_str: String = row.get(10)?;
    let user_id_str: String = row.get(11)?;
    let completed_at_str: Option<String> = row.get(15)?;
    let expires_at_str: String = row.get(16)?;
    let created_at_str: String = row.get(17)?;

    let mission = Mission {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        mission_type: MissionType::from_str(&mission_type_str).unwrap_or(MissionType::Daily),
        category: BadgeCategory::from_str(&category_str).unwrap_or(BadgeCategory::Academic),
        requirement_type: RequirementType::from_str(&requirement_str)
            .unwrap_or(RequirementType::CompleteQuizzes),
        requirement_value: row.get(6)?,
        xp_reward: row.get(7)?,
        icon: row.get(8)?,
        is_active: row.get(9)?,
    };

    let assignment = UserMission {
        id: Uuid::parse_str(&assignment_id_str).unwrap_or_default(),
        user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
        mission_id: mission.id.clone(),
        progress: row.get(13)?,
        completed: row.get(14)?,
        completed_at: completed_at_str
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        expires_at: DateTime::parse_from_rfc3339(&expires_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    };

    Ok((mission, assignment))
}

/// Mission errors.
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("XP grant failed: {0}")]
    XpGrant(#[from] XpError),

    #[error("Assignment not found: {0}")]
    NotFound(String),
}
