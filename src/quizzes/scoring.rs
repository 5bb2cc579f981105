//! Quiz grading.

use uuid::Uuid;

use super::types::{QuizAnswer, QuizQuestion};

/// Percentage of questions answered with their correct option,
/// truncated to an integer. Empty answers or an empty key score 0.
pub fn calculate_score(answers: &[QuizAnswer], correct: &[(Uuid, Uuid)]) -> u32 {
    if answers.is_empty() || correct.is_empty() {
        return 0;
    }

    let total = correct.len() as u32;
    let right = correct
        .iter()
        .filter(|(question_id, option_id)| {
            answers
                .iter()
                .any(|a| a.question_id == *question_id && a.option_id == *option_id)
        })
        .count() as u32;

    right * 100 / total
}

/// Whether a percentage score passes the quiz.
pub fn is_passing_score(score: u32, passing_score: u32) -> bool {
    score >= passing_score
}

/// A perfect score answers every question correctly.
///
/// Drives the distinction between `quiz_completed` and the bonus
/// `quiz_perfect` activity.
pub fn is_perfect_score(score: u32) -> bool {
    score == 100
}

/// Sum of all question points.
pub fn total_points(questions: &[QuizQuestion]) -> u32 {
    questions.iter().map(|q| q.points).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> Vec<(Uuid, Uuid)> {
        (0..n).map(|_| (Uuid::new_v4(), Uuid::new_v4())).collect()
    }

    fn answer_all(key: &[(Uuid, Uuid)]) -> Vec<QuizAnswer> {
        key.iter()
            .map(|(question_id, option_id)| QuizAnswer {
                question_id: *question_id,
                option_id: *option_id,
            })
            .collect()
    }

    #[test]
    fn test_empty_answers_score_zero() {
        let correct = key(5);
        assert_eq!(calculate_score(&[], &correct), 0);
        assert_eq!(calculate_score(&answer_all(&correct), &[]), 0);
    }

    #[test]
    fn test_all_correct_scores_hundred() {
        let correct = key(5);
        assert_eq!(calculate_score(&answer_all(&correct), &correct), 100);
    }

    #[test]
    fn test_partial_score_truncates() {
        let correct = key(3);
        let answers = answer_all(&correct[..2]);
        // 2 of 3 → 66, truncated
        assert_eq!(calculate_score(&answers, &correct), 66);
    }

    #[test]
    fn test_wrong_option_scores_nothing() {
        let correct = key(2);
        let answers = vec![QuizAnswer {
            question_id: correct[0].0,
            option_id: Uuid::new_v4(),
        }];
        assert_eq!(calculate_score(&answers, &correct), 0);
    }

    #[test]
    fn test_passing_boundary() {
        assert!(is_passing_score(60, 60));
        assert!(is_passing_score(100, 60));
        assert!(!is_passing_score(59, 60));
    }

    #[test]
    fn test_perfect_detection() {
        assert!(is_perfect_score(100));
        assert!(!is_perfect_score(99));
    }

    #[test]
    fn test_total_points() {
        let quiz_id = Uuid::new_v4();
        let questions: Vec<QuizQuestion> = (1..=5)
            .map(|i| QuizQuestion {
                id: Uuid::new_v4(),
                quiz_id,
                question: format!("Q{i}"),
                question_order: i,
                points: 20,
            })
            .collect();
        assert_eq!(total_points(&questions), 100);
        assert_eq!(total_points(&[]), 0);
    }
}
