//! Core types for the gamification engine.
//!
//! Defines activity kinds, badge catalogs, requirement types, and the
//! per-user XP ledger row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A kind of user action the platform awards XP for.
///
/// Unknown values round-trip through `Custom` so the activity log can
/// record them; they get no friendly description and advance no mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    /// A quiz attempt was completed
    QuizCompleted,
    /// A quiz attempt scored 100%
    QuizPerfect,
    /// A study material was read
    MaterialRead,
    /// The student enrolled in a class
    Enrolled,
    /// First login of the calendar day
    DailyLogin,
    /// A badge was unlocked (reward grants)
    BadgeUnlocked,
    /// A mission was completed (reward grants)
    MissionCompleted,
    /// Any other activity kind
    Custom(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::QuizCompleted => "quiz_completed",
            ActivityType::QuizPerfect => "quiz_perfect",
            ActivityType::MaterialRead => "material_read",
            ActivityType::Enrolled => "enrolled",
            ActivityType::DailyLogin => "daily_login",
            ActivityType::BadgeUnlocked => "badge_unlocked",
            ActivityType::MissionCompleted => "mission_completed",
            ActivityType::Custom(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "quiz_completed" => ActivityType::QuizCompleted,
            "quiz_perfect" => ActivityType::QuizPerfect,
            "material_read" => ActivityType::MaterialRead,
            "enrolled" => ActivityType::Enrolled,
            "daily_login" => ActivityType::DailyLogin,
            "badge_unlocked" => ActivityType::BadgeUnlocked,
            "mission_completed" => ActivityType::MissionCompleted,
            other => ActivityType::Custom(other.to_string()),
        }
    }

    /// Friendly description for XP notifications. `None` for unknown kinds.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            ActivityType::QuizCompleted => Some("completing a quiz"),
            ActivityType::QuizPerfect => Some("a perfect quiz score"),
            ActivityType::MaterialRead => Some("reading a material"),
            ActivityType::Enrolled => Some("joining a class"),
            ActivityType::DailyLogin => Some("logging in today"),
            ActivityType::BadgeUnlocked => Some("unlocking an achievement"),
            ActivityType::MissionCompleted => Some("completing a mission"),
            ActivityType::Custom(_) => None,
        }
    }

    /// The mission requirement this activity advances, if any.
    ///
    /// Fixed one-to-one table: reward-grant activities and unknown kinds
    /// advance nothing.
    pub fn mission_requirement(&self) -> Option<RequirementType> {
        match self {
            ActivityType::QuizCompleted => Some(RequirementType::CompleteQuizzes),
            ActivityType::QuizPerfect => Some(RequirementType::PerfectQuizzes),
            ActivityType::MaterialRead => Some(RequirementType::ReadMaterials),
            ActivityType::Enrolled => Some(RequirementType::JoinClasses),
            ActivityType::DailyLogin => Some(RequirementType::DailyLogin),
            ActivityType::BadgeUnlocked
            | ActivityType::MissionCompleted
            | ActivityType::Custom(_) => None,
        }
    }

    /// Whether this activity counts towards the daily streak.
    ///
    /// Reward grants are side effects of other activity, not activity of
    /// their own.
    pub fn advances_streak(&self) -> bool {
        !matches!(
            self,
            ActivityType::BadgeUnlocked | ActivityType::MissionCompleted
        )
    }
}

impl From<String> for ActivityType {
    fn from(s: String) -> Self {
        ActivityType::parse(&s)
    }
}

impl From<ActivityType> for String {
    fn from(activity: ActivityType) -> Self {
        activity.as_str().to_string()
    }
}

/// The aggregate a badge or mission requirement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// Count of completed quiz attempts
    CompleteQuizzes,
    /// Count of perfect quiz attempts
    PerfectQuizzes,
    /// Count of materials read
    ReadMaterials,
    /// Count of distinct login days
    DailyLogin,
    /// Count of class enrollments
    JoinClasses,
    /// Total XP on the ledger
    EarnTotalXp,
    /// Longest streak ever reached
    ReachStreak,
}

impl RequirementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::CompleteQuizzes => "complete_quizzes",
            RequirementType::PerfectQuizzes => "perfect_quizzes",
            RequirementType::ReadMaterials => "read_materials",
            RequirementType::DailyLogin => "daily_login",
            RequirementType::JoinClasses => "join_classes",
            RequirementType::EarnTotalXp => "earn_total_xp",
            RequirementType::ReachStreak => "reach_streak",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "complete_quizzes" => Some(RequirementType::CompleteQuizzes),
            "perfect_quizzes" => Some(RequirementType::PerfectQuizzes),
            "read_materials" => Some(RequirementType::ReadMaterials),
            "daily_login" => Some(RequirementType::DailyLogin),
            "join_classes" => Some(RequirementType::JoinClasses),
            "earn_total_xp" => Some(RequirementType::EarnTotalXp),
            "reach_streak" => Some(RequirementType::ReachStreak),
            _ => None,
        }
    }
}

/// Badge category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    /// Quiz and reading milestones
    Academic,
    /// Streaks and regular logins
    Engagement,
    /// Class participation
    Social,
    /// XP milestones and one-offs
    Special,
}

impl BadgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::Academic => "academic",
            BadgeCategory::Engagement => "engagement",
            BadgeCategory::Social => "social",
            BadgeCategory::Special => "special",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "academic" => Some(BadgeCategory::Academic),
            "engagement" => Some(BadgeCategory::Engagement),
            "social" => Some(BadgeCategory::Social),
            "special" => Some(BadgeCategory::Special),
            _ => None,
        }
    }
}

/// Badge definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub requirement_type: RequirementType,
    pub requirement_value: i64,
    pub xp_reward: u32,
}

/// Unlocked badge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub badge: Badge,
    pub unlocked_at: DateTime<Utc>,
}

/// Per-user XP ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserXp {
    pub user_id: Uuid,
    pub total_xp: i64,
    pub level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an XP grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddXpResult {
    pub new_total_xp: i64,
    pub new_level: u32,
    pub level_up: bool,
}

/// One appended activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub xp_earned: u32,
    pub activity_date: NaiveDate,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard row: top users by total XP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub total_xp: i64,
    pub level: u32,
}

/// Default badge definitions.
pub fn default_badges() -> Vec<Badge> {
    vec![
        Badge {
            id: "first_quiz".to_string(),
            name: "First Steps".to_string(),
            description: "Complete your first quiz".to_string(),
            icon: "🎯".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::CompleteQuizzes,
            requirement_value: 1,
            xp_reward: 20,
        },
        Badge {
            id: "quiz_10".to_string(),
            name: "Quiz Veteran".to_string(),
            description: "Complete 10 quizzes".to_string(),
            icon: "📚".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::CompleteQuizzes,
            requirement_value: 10,
            xp_reward: 50,
        },
        Badge {
            id: "first_perfect".to_string(),
            name: "Flawless".to_string(),
            description: "Score 100% on a quiz".to_string(),
            icon: "✨".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::PerfectQuizzes,
            requirement_value: 1,
            xp_reward: 30,
        },
        Badge {
            id: "perfect_5".to_string(),
            name: "Perfectionist".to_string(),
            description: "Score 100% on 5 quizzes".to_string(),
            icon: "🌟".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::PerfectQuizzes,
            requirement_value: 5,
            xp_reward: 100,
        },
        Badge {
            id: "first_material".to_string(),
            name: "Curious Mind".to_string(),
            description: "Read your first material".to_string(),
            icon: "🔍".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::ReadMaterials,
            requirement_value: 1,
            xp_reward: 10,
        },
        Badge {
            id: "bookworm".to_string(),
            name: "Bookworm".to_string(),
            description: "Read 10 materials".to_string(),
            icon: "📖".to_string(),
            category: BadgeCategory::Academic,
            requirement_type: RequirementType::ReadMaterials,
            requirement_value: 10,
            xp_reward: 40,
        },
        Badge {
            id: "week_streak".to_string(),
            name: "Week Warrior".to_string(),
            description: "Study 7 days in a row".to_string(),
            icon: "🔥".to_string(),
            category: BadgeCategory::Engagement,
            requirement_type: RequirementType::ReachStreak,
            requirement_value: 7,
            xp_reward: 70,
        },
        Badge {
            id: "month_streak".to_string(),
            name: "Unstoppable".to_string(),
            description: "Study 30 days in a row".to_string(),
            icon: "⚡".to_string(),
            category: BadgeCategory::Engagement,
            requirement_type: RequirementType::ReachStreak,
            requirement_value: 30,
            xp_reward: 200,
        },
        Badge {
            id: "login_30".to_string(),
            name: "Regular".to_string(),
            description: "Log in on 30 different days".to_string(),
            icon: "📅".to_string(),
            category: BadgeCategory::Engagement,
            requirement_type: RequirementType::DailyLogin,
            requirement_value: 30,
            xp_reward: 60,
        },
        Badge {
            id: "first_class".to_string(),
            name: "Welcome Aboard".to_string(),
            description: "Join your first class".to_string(),
            icon: "🎓".to_string(),
            category: BadgeCategory::Social,
            requirement_type: RequirementType::JoinClasses,
            requirement_value: 1,
            xp_reward: 15,
        },
        Badge {
            id: "class_3".to_string(),
            name: "Social Learner".to_string(),
            description: "Join 3 classes".to_string(),
            icon: "🤝".to_string(),
            category: BadgeCategory::Social,
            requirement_type: RequirementType::JoinClasses,
            requirement_value: 3,
            xp_reward: 45,
        },
        Badge {
            id: "xp_1000".to_string(),
            name: "Rising Star".to_string(),
            description: "Earn 1000 XP".to_string(),
            icon: "🏆".to_string(),
            category: BadgeCategory::Special,
            requirement_type: RequirementType::EarnTotalXp,
            requirement_value: 1000,
            xp_reward: 100,
        },
        Badge {
            id: "xp_5000".to_string(),
            name: "Legend".to_string(),
            description: "Earn 5000 XP".to_string(),
            icon: "👑".to_string(),
            category: BadgeCategory::Special,
            requirement_type: RequirementType::EarnTotalXp,
            requirement_value: 5000,
            xp_reward: 250,
        },
    ]
}
