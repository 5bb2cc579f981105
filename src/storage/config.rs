//! Application configuration.
//!
//! XP awards and quiz defaults are configuration, not inferred behavior:
//! embedders tune them here and the engine reads them at call time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::gamification::types::ActivityType;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// XP award settings
    pub xp: XpSettings,
    /// Quiz settings
    pub quizzes: QuizSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            xp: XpSettings::default(),
            quizzes: QuizSettings::default(),
        }
    }
}

/// XP awarded per activity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpSettings {
    /// XP for completing a quiz
    pub quiz_completed: u32,
    /// XP for a perfect quiz score
    pub quiz_perfect: u32,
    /// XP for reading a material
    pub material_read: u32,
    /// XP for enrolling in a class
    pub enrolled: u32,
    /// XP for the first login of the day
    pub daily_login: u32,
}

impl Default for XpSettings {
    fn default() -> Self {
        Self {
            quiz_completed: 30,
            quiz_perfect: 50,
            material_read: 10,
            enrolled: 15,
            daily_login: 5,
        }
    }
}

impl XpSettings {
    /// XP award for an activity type. Badge and mission rewards come from
    /// their catalogs and custom activities carry their own amounts, so
    /// those award zero here.
    pub fn award_for(&self, activity: &ActivityType) -> u32 {
        match activity {
            ActivityType::QuizCompleted => self.quiz_completed,
            ActivityType::QuizPerfect => self.quiz_perfect,
            ActivityType::MaterialRead => self.material_read,
            ActivityType::Enrolled => self.enrolled,
            ActivityType::DailyLogin => self.daily_login,
            ActivityType::BadgeUnlocked
            | ActivityType::MissionCompleted
            | ActivityType::Custom(_) => 0,
        }
    }
}

/// Quiz-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSettings {
    /// Minimum score (percent) to pass a quiz
    pub passing_score: u32,
    /// Time limit for generated quizzes in minutes
    pub generated_time_limit_minutes: u32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            passing_score: 60,
            generated_time_limit_minutes: 30,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "providenceit", "Lumina")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        let config = AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_awards_match_platform_values() {
        let settings = XpSettings::default();
        assert_eq!(settings.award_for(&ActivityType::QuizCompleted), 30);
        assert_eq!(settings.award_for(&ActivityType::MaterialRead), 10);
        assert_eq!(settings.award_for(&ActivityType::BadgeUnlocked), 0);
        assert_eq!(
            settings.award_for(&ActivityType::Custom("plot_twist".to_string())),
            0
        );
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.xp.quiz_completed, config.xp.quiz_completed);
        assert_eq!(parsed.quizzes.passing_score, 60);
    }
}
