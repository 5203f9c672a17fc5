use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::attempt::ExamAttempt;

/// Aggregate over the attempt history. Always derived, never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_attempts: usize,
    pub total_questions_answered: usize,
    pub total_correct: usize,
    pub average_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_date: Option<DateTime<Utc>>,
}

impl UserStats {
    /// Recompute from the history, newest attempt first. Incomplete attempts are ignored.
    #[must_use]
    pub fn from_attempts(attempts: &[ExamAttempt]) -> Self {
        let completed: Vec<&ExamAttempt> = attempts.iter().filter(|a| a.completed).collect();
        if completed.is_empty() {
            return Self::default();
        }

        let score_sum: u64 = completed.iter().map(|a| u64::from(a.score)).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = score_sum as f64 / completed.len() as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let average_score = mean.round() as u32;

        Self {
            total_attempts: completed.len(),
            total_questions_answered: completed.iter().map(|a| a.total_questions).sum(),
            total_correct: completed.iter().map(|a| a.correct_count).sum(),
            average_score,
            last_attempt_date: completed.first().and_then(|a| a.end_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptId, BankId, ExamMode};
    use crate::time::fixed_now;

    fn attempt(id: &str, score: u32, completed: bool) -> ExamAttempt {
        ExamAttempt {
            id: AttemptId::new(id),
            question_bank_id: BankId::new("b"),
            question_bank_name: "B".into(),
            mode: ExamMode::Exam,
            start_time: fixed_now(),
            end_time: Some(fixed_now() + chrono::Duration::minutes(i64::from(score))),
            answers: Vec::new(),
            total_questions: 4,
            correct_count: 2,
            wrong_count: 1,
            skipped_count: 1,
            score,
            completed,
            total_points: 4.0,
            earned_points: 2.0,
            section_scores: Vec::new(),
            passed: None,
        }
    }

    #[test]
    fn empty_history_yields_zeroes() {
        assert_eq!(UserStats::from_attempts(&[]), UserStats::default());
    }

    #[test]
    fn averages_and_rounds_completed_attempts() {
        let attempts = vec![
            attempt("newest", 50, true),
            attempt("ignored", 0, false),
            attempt("older", 75, true),
        ];
        let stats = UserStats::from_attempts(&attempts);
        assert_eq!(stats.total_attempts, 2);
        assert_eq!(stats.total_questions_answered, 8);
        assert_eq!(stats.total_correct, 4);
        assert_eq!(stats.average_score, 63);
        assert_eq!(stats.last_attempt_date, attempts[0].end_time);
    }
}
