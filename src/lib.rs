//! LUMINA - Academic Gamification Engine
//!
//! The state layer behind the LUMINA learning platform: XP and leveling,
//! daily streaks, badge unlocks, time-boxed daily and weekly missions,
//! class enrollment with join codes, material publishing, and quiz
//! grading, persisted in SQLite.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod classes;
pub mod gamification;
pub mod missions;
pub mod quizzes;
pub mod storage;

// Re-export commonly used types
pub use classes::store::ClassStore;
pub use gamification::engine::{ActivityOutcome, GamificationEngine, Notification};
pub use gamification::types::{ActivityType, AddXpResult, Badge, RequirementType, UserXp};
pub use gamification::xp::XpManager;
pub use missions::manager::MissionManager;
pub use quizzes::store::QuizStore;
pub use storage::config::AppConfig;
pub use storage::database::{Database, DatabaseError};

/// Configure tracing output for embedders without their own subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
