//! Quiz persistence: catalog, attempts, and generated-quiz import.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::scoring;
use super::types::{GeneratedQuiz, Quiz, QuizAnswer, QuizAttempt, QuizOption, QuizQuestion};
use crate::storage::config::QuizSettings;

/// Store for quizzes, questions, options, and attempts.
pub struct QuizStore<'a> {
    conn: &'a Connection,
}

impl<'a> QuizStore<'a> {
    /// Create a new quiz store with a database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a quiz.
    #[allow(clippy::too_many_arguments)]
    pub fn create_quiz(
        &self,
        class_id: Uuid,
        teacher_id: Uuid,
        title: &str,
        description: Option<&str>,
        is_published: bool,
        passing_score: u32,
        time_limit_minutes: Option<u32>,
    ) -> Result<Quiz, QuizError> {
        let now = Utc::now();
        let quiz = Quiz {
            id: Uuid::new_v4(),
            class_id,
            teacher_id,
            title: title.to_string(),
            description: description.map(str::to_string),
            is_published,
            passing_score,
            time_limit_minutes,
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            "INSERT INTO quizzes (id, class_id, teacher_id, title, description, is_published, passing_score, time_limit_minutes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                quiz.id.to_string(),
                quiz.class_id.to_string(),
                quiz.teacher_id.to_string(),
                quiz.title,
                quiz.description,
                quiz.is_published,
                quiz.passing_score,
                quiz.time_limit_minutes,
                now.to_rfc3339(),
            ],
        )?;

        Ok(quiz)
    }

    /// Get a quiz by id.
    pub fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>, QuizError> {
        self.conn
            .query_row(
                "SELECT id, class_id, teacher_id, title, description, is_published, passing_score, time_limit_minutes, created_at, updated_at
                 FROM quizzes WHERE id = ?1",
                params![quiz_id.to_string()],
                parse_quiz_row,
            )
            .optional()
            .map_err(QuizError::from)
    }

    /// Published quizzes of a class, newest first.
    pub fn published_for_class(&self, class_id: Uuid) -> Result<Vec<Quiz>, QuizError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, teacher_id, title, description, is_published, passing_score, time_limit_minutes, created_at, updated_at
             FROM quizzes
             WHERE class_id = ?1 AND is_published = 1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![class_id.to_string()], parse_quiz_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(QuizError::from)
    }

    /// Add a question to a quiz.
    pub fn add_question(
        &self,
        quiz_id: Uuid,
        question: &str,
        question_order: u32,
        points: u32,
    ) -> Result<QuizQuestion, QuizError> {
        let row = QuizQuestion {
            id: Uuid::new_v4(),
            quiz_id,
            question: question.to_string(),
            question_order,
            points,
        };

        self.conn.execute(
            "INSERT INTO quiz_questions (id, quiz_id, question, question_order, points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id.to_string(),
                row.quiz_id.to_string(),
                row.question,
                row.question_order,
                row.points,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(row)
    }

    /// Add an answer option to a question.
    pub fn add_option(
        &self,
        question_id: Uuid,
        option_text: &str,
        option_order: u32,
        is_correct: bool,
    ) -> Result<QuizOption, QuizError> {
        let row = QuizOption {
            id: Uuid::new_v4(),
            question_id,
            option_text: option_text.to_string(),
            option_order,
            is_correct,
        };

        self.conn.execute(
            "INSERT INTO quiz_options (id, question_id, option_text, option_order, is_correct, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id.to_string(),
                row.question_id.to_string(),
                row.option_text,
                row.option_order,
                row.is_correct,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(row)
    }

    /// Questions of a quiz with their options, in presentation order.
    pub fn questions_with_options(
        &self,
        quiz_id: Uuid,
    ) -> Result<Vec<(QuizQuestion, Vec<QuizOption>)>, QuizError> {
        let mut question_stmt = self.conn.prepare(
            "SELECT id, quiz_id, question, question_order, points
             FROM quiz_questions
             WHERE quiz_id = ?1
             ORDER BY question_order ASC",
        )?;
        let questions = question_stmt
            .query_map(params![quiz_id.to_string()], parse_question_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut option_stmt = self.conn.prepare(
            "SELECT id, question_id, option_text, option_order, is_correct
             FROM quiz_options
             WHERE question_id = ?1
             ORDER BY option_order ASC",
        )?;

        let mut result = Vec::with_capacity(questions.len());
        for question in questions {
            let options = option_stmt
                .query_map(params![question.id.to_string()], parse_option_row)?
                .collect::<Result<Vec<_>, _>>()?;
            result.push((question, options));
        }

        Ok(result)
    }

    /// The correct option per question, the key `scoring` grades against.
    pub fn correct_options(&self, quiz_id: Uuid) -> Result<Vec<(Uuid, Uuid)>, QuizError> {
        let mut stmt = self.conn.prepare(
            "SELECT q.id, o.id
             FROM quiz_questions q
             JOIN quiz_options o ON o.question_id = q.id
             WHERE q.quiz_id = ?1 AND o.is_correct = 1
             ORDER BY q.question_order ASC",
        )?;

        let rows = stmt.query_map(params![quiz_id.to_string()], |row| {
            let question_str: String = row.get(0)?;
            let option_str: String = row.get(1)?;
            Ok((
                Uuid::parse_str(&question_str).unwrap_or_default(),
                Uuid::parse_str(&option_str).unwrap_or_default(),
            ))
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(QuizError::from)
    }

    /// Start an attempt at a quiz.
    pub fn start_attempt(&self, quiz_id: Uuid, student_id: Uuid) -> Result<QuizAttempt, QuizError> {
        if self.get_quiz(quiz_id)?.is_none() {
            return Err(QuizError::NotFound(quiz_id));
        }

        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id,
            student_id,
            answers: Vec::new(),
            score: None,
            total_points: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        self.conn.execute(
            "INSERT INTO quiz_attempts (id, quiz_id, student_id, answers_json, score, total_points, started_at, completed_at)
             VALUES (?1, ?2, ?3, NULL, NULL, NULL, ?4, NULL)",
            params![
                attempt.id.to_string(),
                attempt.quiz_id.to_string(),
                attempt.student_id.to_string(),
                attempt.started_at.to_rfc3339(),
            ],
        )?;

        Ok(attempt)
    }

    /// Complete an attempt: grade the answers and stamp the result.
    pub fn complete_attempt(
        &self,
        attempt_id: Uuid,
        answers: &[QuizAnswer],
    ) -> Result<QuizAttempt, QuizError> {
        let mut attempt = self
            .get_attempt(attempt_id)?
            .ok_or(QuizError::NotFound(attempt_id))?;

        let correct = self.correct_options(attempt.quiz_id)?;
        let questions: Vec<QuizQuestion> = self
            .questions_with_options(attempt.quiz_id)?
            .into_iter()
            .map(|(question, _)| question)
            .collect();

        let score = scoring::calculate_score(answers, &correct);
        let total_points = scoring::total_points(&questions);
        let now = Utc::now();

        self.conn.execute(
            "UPDATE quiz_attempts SET answers_json = ?2, score = ?3, total_points = ?4, completed_at = ?5
             WHERE id = ?1",
            params![
                attempt_id.to_string(),
                serde_json::to_string(answers)?,
                score,
                total_points,
                now.to_rfc3339(),
            ],
        )?;

        attempt.answers = answers.to_vec();
        attempt.score = Some(score);
        attempt.total_points = Some(total_points);
        attempt.completed_at = Some(now);

        Ok(attempt)
    }

    /// Get an attempt by id.
    pub fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>, QuizError> {
        self.conn
            .query_row(
                "SELECT id, quiz_id, student_id, answers_json, score, total_points, started_at, completed_at
                 FROM quiz_attempts WHERE id = ?1",
                params![attempt_id.to_string()],
                parse_attempt_row,
            )
            .optional()
            .map_err(QuizError::from)
    }

    /// Attempts a student has made, newest first.
    pub fn attempts_for_student(&self, student_id: Uuid) -> Result<Vec<QuizAttempt>, QuizError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, quiz_id, student_id, answers_json, score, total_points, started_at, completed_at
             FROM quiz_attempts
             WHERE student_id = ?1
             ORDER BY started_at DESC",
        )?;

        let rows = stmt.query_map(params![student_id.to_string()], parse_attempt_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(QuizError::from)
    }

    /// Persist a generated quiz document as quiz, question, and option
    /// rows, published and graded with the configured defaults.
    ///
    /// All rows commit together or not at all. The document is written
    /// as given; its shape is the generator's contract, not validated
    /// here.
    pub fn import_generated(
        &self,
        class_id: Uuid,
        teacher_id: Uuid,
        doc: &GeneratedQuiz,
        settings: &QuizSettings,
    ) -> Result<Quiz, QuizError> {
        let tx = self.conn.unchecked_transaction()?;

        let store = QuizStore::new(&tx);
        let quiz = store.create_quiz(
            class_id,
            teacher_id,
            &doc.quiz_title,
            Some(&doc.quiz_description),
            true,
            settings.passing_score,
            Some(settings.generated_time_limit_minutes),
        )?;

        for question in &doc.questions {
            let inserted = store.add_question(
                quiz.id,
                &question.question_text,
                question.question_order,
                question.points,
            )?;

            for option in &question.options {
                store.add_option(
                    inserted.id,
                    &option.option_text,
                    option.option_order,
                    option.is_correct,
                )?;
            }
        }

        tx.commit()?;

        Ok(quiz)
    }
}

/// Parse a database row into a Quiz.
fn parse_quiz_row(row: &rusqlite::Row) -> rusqlite::Result<Quiz> {
    let id_str: String = row.get(0)?;
    let class_str: String = row.get(1)?;
    let teacher_str: String = row.get(2)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(Quiz {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        class_id: Uuid::parse_str(&class_str).unwrap_or_default(),
        teacher_id: Uuid::parse_str(&teacher_str).unwrap_or_default(),
        title: row.get(3)?,
        description: row.get(4)?,
        is_published: row.get(5)?,
        passing_score: row.get(6)?,
        time_limit_minutes: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Parse a database row into a QuizQuestion.
fn parse_question_row(row: &rusqlite::Row) -> rusqlite::Result<QuizQuestion> {
    let id_str: String = row.get(0)?;
    let quiz_str: String = row.get(1)?;

    Ok(QuizQuestion {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        quiz_id: Uuid::parse_str(&quiz_str).unwrap_or_default(),
        question: row.get(2)?,
        question_order: row.get(3)?,
        points: row.get(4)?,
    })
}

/// Parse a database row into a QuizOption.
fn parse_option_row(row: &rusqlite::Row) -> rusqlite::Result<QuizOption> {
    let id_str: String = row.get(0)?;
    let question_str: String = row.get(1)?;

    Ok(QuizOption {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        question_id: Uuid::parse_str(&question_str).unwrap_or_default(),
        option_text: row.get(2)?,
        option_order: row.get(3)?,
        is_correct: row.get(4)?,
    })
}

/// Parse a database row into a QuizAttempt.
fn parse_attempt_row(row: &rusqlite::Row) -> rusqlite::Result<QuizAttempt> {
    let id_str: String = row.get(0)?;
    let quiz_str: String = row.get(1)?;
    let student_str: String = row.get(2)?;
    let answers_json: Option<String> = row.get(3)?;
    let started_at_str: String = row.get(6)?;
    let completed_at_str: Option<String> = row.get(7)?;

    Ok(QuizAttempt {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        quiz_id: Uuid::parse_str(&quiz_str).unwrap_or_default(),
        student_id: Uuid::parse_str(&student_str).unwrap_or_default(),
        answers: answers_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        score: row.get(4)?,
        total_points: row.get(5)?,
        started_at: DateTime::parse_from_rfc3339(&started_at_str)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at_str
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

/// Quiz errors.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Quiz or attempt not found: {0}")]
    NotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::store::ClassStore;
    use crate::storage::database::Database;

    fn sample_doc() -> GeneratedQuiz {
        serde_json::from_value(serde_json::json!({
            "quiz_title": "Weekly Review",
            "quiz_description": "Covers this week's materials",
            "questions": (1..=5).map(|i| serde_json::json!({
                "question_text": format!("Question {i}"),
                "question_order": i,
                "points": 20,
                "options": (1..=4).map(|o| serde_json::json!({
                    "option_text": format!("Option {o}"),
                    "option_order": o,
                    "is_correct": o == 2,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let teacher_id = Uuid::new_v4();
        let class_id = {
            let classes = ClassStore::new(db.connection());
            classes.create_class("Physics", None, teacher_id).unwrap().id
        };
        (db, class_id, teacher_id)
    }

    #[test]
    fn test_import_generated_writes_all_rows() {
        let (db, class_id, teacher_id) = setup();
        let store = QuizStore::new(db.connection());

        let quiz = store
            .import_generated(class_id, teacher_id, &sample_doc(), &QuizSettings::default())
            .unwrap();

        assert!(quiz.is_published);
        assert_eq!(quiz.passing_score, 60);
        assert_eq!(quiz.time_limit_minutes, Some(30));

        let questions = store.questions_with_options(quiz.id).unwrap();
        assert_eq!(questions.len(), 5);
        for (_, options) in &questions {
            assert_eq!(options.len(), 4);
            assert_eq!(options.iter().filter(|o| o.is_correct).count(), 1);
        }

        let correct = store.correct_options(quiz.id).unwrap();
        assert_eq!(correct.len(), 5);
    }

    #[test]
    fn test_attempt_grading_round_trip() {
        let (db, class_id, teacher_id) = setup();
        let store = QuizStore::new(db.connection());
        let student_id = Uuid::new_v4();

        let quiz = store
            .import_generated(class_id, teacher_id, &sample_doc(), &QuizSettings::default())
            .unwrap();
        let correct = store.correct_options(quiz.id).unwrap();

        let attempt = store.start_attempt(quiz.id, student_id).unwrap();

        // Answer the first three correctly, the rest wrong
        let answers: Vec<QuizAnswer> = correct
            .iter()
            .enumerate()
            .map(|(i, (question_id, option_id))| QuizAnswer {
                question_id: *question_id,
                option_id: if i < 3 { *option_id } else { Uuid::new_v4() },
            })
            .collect();

        let graded = store.complete_attempt(attempt.id, &answers).unwrap();
        assert_eq!(graded.score, Some(60));
        assert_eq!(graded.total_points, Some(100));
        assert!(graded.completed_at.is_some());
        assert!(scoring::is_passing_score(graded.score.unwrap(), quiz.passing_score));
        assert!(!scoring::is_perfect_score(graded.score.unwrap()));

        // Persisted the same result
        let fetched = store.get_attempt(attempt.id).unwrap().unwrap();
        assert_eq!(fetched.score, Some(60));
        assert_eq!(fetched.answers.len(), 5);
    }

    #[test]
    fn test_perfect_attempt() {
        let (db, class_id, teacher_id) = setup();
        let store = QuizStore::new(db.connection());
        let student_id = Uuid::new_v4();

        let quiz = store
            .import_generated(class_id, teacher_id, &sample_doc(), &QuizSettings::default())
            .unwrap();
        let correct = store.correct_options(quiz.id).unwrap();

        let attempt = store.start_attempt(quiz.id, student_id).unwrap();
        let answers: Vec<QuizAnswer> = correct
            .iter()
            .map(|(question_id, option_id)| QuizAnswer {
                question_id: *question_id,
                option_id: *option_id,
            })
            .collect();

        let graded = store.complete_attempt(attempt.id, &answers).unwrap();
        assert_eq!(graded.score, Some(100));
        assert!(scoring::is_perfect_score(graded.score.unwrap()));
    }

    #[test]
    fn test_attempt_on_missing_quiz_fails() {
        let (db, _, _) = setup();
        let store = QuizStore::new(db.connection());

        let result = store.start_attempt(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(QuizError::NotFound(_))));
    }

    #[test]
    fn test_published_for_class_filters_drafts() {
        let (db, class_id, teacher_id) = setup();
        let store = QuizStore::new(db.connection());

        store
            .create_quiz(class_id, teacher_id, "Draft", None, false, 60, None)
            .unwrap();
        store
            .create_quiz(class_id, teacher_id, "Published", None, true, 60, None)
            .unwrap();

        let published = store.published_for_class(class_id).unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "Published");
    }
}
