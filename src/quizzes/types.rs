//! Quiz, question, option, and attempt types, plus the document shape
//! the AI quiz generator produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A quiz belonging to a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub class_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    /// Minimum percentage score to pass
    pub passing_score: u32,
    pub time_limit_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One question of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question: String,
    pub question_order: u32,
    pub points: u32,
}

/// One answer option of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub option_order: u32,
    pub is_correct: bool,
}

/// The option a student selected for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_id: Uuid,
    pub option_id: Uuid,
}

/// One student's attempt at a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub answers: Vec<QuizAnswer>,
    /// Percentage score, set on completion
    pub score: Option<u32>,
    pub total_points: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Quiz document produced by the AI generator.
///
/// The generator guarantees exactly one correct option per question;
/// this layer persists the document as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub quiz_title: String,
    pub quiz_description: String,
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub question_order: u32,
    pub points: u32,
    pub options: Vec<GeneratedOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedOption {
    pub option_text: String,
    pub option_order: u32,
    pub is_correct: bool,
}
