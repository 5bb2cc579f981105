//! Mission catalog and assignment types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gamification::types::{BadgeCategory, RequirementType};

/// Mission cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Daily,
    Weekly,
}

impl MissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionType::Daily => "daily",
            MissionType::Weekly => "weekly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(MissionType::Daily),
            "weekly" => Some(MissionType::Weekly),
            _ => None,
        }
    }

    /// How long an assignment of this cadence stays active.
    pub fn duration(&self) -> Duration {
        match self {
            MissionType::Daily => Duration::days(1),
            MissionType::Weekly => Duration::days(7),
        }
    }
}

/// Mission definition from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mission_type: MissionType,
    pub category: BadgeCategory,
    pub requirement_type: RequirementType,
    pub requirement_value: i64,
    pub xp_reward: u32,
    pub icon: String,
    pub is_active: bool,
}

/// Per-user mission assignment with expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mission_id: String,
    pub progress: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Default mission definitions.
pub fn default_missions() -> Vec<Mission> {
    vec![
        Mission {
            id: "daily_quiz".to_string(),
            name: "Daily Challenge".to_string(),
            description: "Complete a quiz today".to_string(),
            mission_type: MissionType::Daily,
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::CompleteQuizzes,
            requirement_value: 1,
            xp_reward: 15,
            icon: "🎯".to_string(),
            is_active: true,
        },
        Mission {
            id: "daily_reading".to_string(),
            name: "Daily Reading".to_string(),
            description: "Read 2 materials today".to_string(),
            mission_type: MissionType::Daily,
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::ReadMaterials,
            requirement_value: 2,
            xp_reward: 10,
            icon: "📖".to_string(),
            is_active: true,
        },
        Mission {
            id: "daily_login".to_string(),
            name: "Show Up".to_string(),
            description: "Log in to the platform".to_string(),
            mission_type: MissionType::Daily,
            category: BadgeCategory::Engagement,
            requirement_type: RequirementType::DailyLogin,
            requirement_value: 1,
            xp_reward: 5,
            icon: "📅".to_string(),
            is_active: true,
        },
        Mission {
            id: "weekly_quizzes".to_string(),
            name: "Quiz Marathon".to_string(),
            description: "Complete 5 quizzes this week".to_string(),
            mission_type: MissionType::Weekly,
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::CompleteQuizzes,
            requirement_value: 5,
            xp_reward: 75,
            icon: "🏃".to_string(),
            is_active: true,
        },
        Mission {
            id: "weekly_perfect".to_string(),
            name: "Aim High".to_string(),
            description: "Score 100% on a quiz this week".to_string(),
            mission_type: MissionType::Weekly,
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::PerfectQuizzes,
            requirement_value: 1,
            xp_reward: 50,
            icon: "🌟".to_string(),
            is_active: true,
        },
        Mission {
            id: "weekly_reading".to_string(),
            name: "Study Session".to_string(),
            description: "Read 8 materials this week".to_string(),
            mission_type: MissionType::Weekly,
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::ReadMaterials,
            requirement_value: 8,
            xp_reward: 60,
            icon: "📚".to_string(),
            is_active: true,
        },
    ]
}
