use chrono::{DateTime, Utc};

use exam_core::model::ExamMode;

use super::active::ActiveExam;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub remaining: usize,
    pub elapsed_secs: u64,
    /// Countdown for timed exams. Informational only: submission is never forced.
    pub time_left_secs: Option<u64>,
    pub overtime: bool,
}

/// One cell of the question navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionStatus {
    pub position: usize,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

impl ActiveExam {
    /// Progress at `now`. Elapsed time runs from the stored start, so it survives a resume.
    #[must_use]
    pub fn progress(&self, now: DateTime<Utc>) -> SessionProgress {
        let session = self.session();
        let total = self.len();
        let answered = session.answered_count();
        let elapsed_secs = u64::try_from((now - session.started_at).num_seconds()).unwrap_or(0);

        let limit_secs = session
            .time_limit
            .filter(|_| session.mode == ExamMode::Exam)
            .map(|minutes| u64::from(minutes) * 60);

        SessionProgress {
            total,
            answered,
            flagged: session.flagged.len(),
            remaining: total.saturating_sub(answered),
            elapsed_secs,
            time_left_secs: limit_secs.map(|limit| limit.saturating_sub(elapsed_secs)),
            overtime: limit_secs.is_some_and(|limit| elapsed_secs > limit),
        }
    }

    /// Status of every position in session order.
    #[must_use]
    pub fn statuses(&self) -> Vec<QuestionStatus> {
        let session = self.session();
        (0..self.len())
            .map(|position| {
                let idx = session.bank_index(position).unwrap_or(position);
                QuestionStatus {
                    position,
                    answered: !session.selected(idx).is_empty(),
                    flagged: session.flagged.contains(&idx),
                    current: position == session.position,
                }
            })
            .collect()
    }
}
