//! Quizzes, grading, and generated-quiz import.

pub mod scoring;
pub mod store;
pub mod types;

pub use scoring::{calculate_score, is_passing_score, is_perfect_score, total_points};
pub use store::{QuizError, QuizStore};
pub use types::{
    GeneratedOption, GeneratedQuestion, GeneratedQuiz, Quiz, QuizAnswer, QuizAttempt, QuizOption,
    QuizQuestion,
};
