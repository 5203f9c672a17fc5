use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{AttemptId, BankId};

/// How a quiz is taken.
///
/// `Exam` defers all feedback to submission and may shuffle question order;
/// `Practice` reveals correctness question by question and never reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    Exam,
    Practice,
}

impl ExamMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamMode::Exam => "exam",
            ExamMode::Practice => "practice",
        }
    }
}

impl fmt::Display for ExamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exam" => Ok(ExamMode::Exam),
            "practice" => Ok(ExamMode::Practice),
            other => Err(format!("unknown exam mode: {other}")),
        }
    }
}

/// Outcome for one question of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_index: usize,
    pub selected_options: Vec<String>,
    pub is_correct: bool,
    #[serde(default)]
    pub points_earned: f64,
    #[serde(default)]
    pub points_possible: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub used_hint: bool,
}

impl UserAnswer {
    /// An empty selection counts as skipped, never as wrong.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.selected_options.is_empty()
    }

    #[must_use]
    pub fn is_wrong(&self) -> bool {
        !self.is_skipped() && !self.is_correct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: String,
    pub score: u32,
    pub weight: f64,
}

/// Immutable record of one submitted run through a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAttempt {
    pub id: AttemptId,
    pub question_bank_id: BankId,
    pub question_bank_name: String,
    pub mode: ExamMode,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub answers: Vec<UserAnswer>,
    pub total_questions: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub skipped_count: usize,
    pub score: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub total_points: f64,
    #[serde(default)]
    pub earned_points: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section_scores: Vec<SectionScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

impl ExamAttempt {
    /// Wall-clock time between start and submission.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Number of questions hinted during the run.
    #[must_use]
    pub fn hints_used(&self) -> usize {
        self.answers.iter().filter(|a| a.used_hint).count()
    }
}
