//! Gamification engine: XP, levels, streaks, badges, and orchestration.

pub mod badges;
pub mod engine;
pub mod streak;
pub mod types;
pub mod xp;

pub use badges::{BadgeError, BadgeManager, UserStats};
pub use engine::{ActivityOutcome, EngineError, GamificationEngine, Notification};
pub use streak::{StreakError, StreakManager};
pub use types::{
    ActivityLogEntry, ActivityType, AddXpResult, Badge, BadgeCategory, EarnedBadge,
    LeaderboardEntry, RequirementType, UserXp,
};
pub use xp::{level_for_xp, XpError, XpManager, LEVEL_THRESHOLDS};
