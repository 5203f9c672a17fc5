use std::collections::BTreeMap;
use std::sync::Arc;

use exam_core::model::{AttemptId, BankId, ExamAttempt, ExamMode, ExamSession, QuestionBank};
use exam_core::scoring::grade_attempt;
use storage::repository::{AttemptRepository, BankRepository, SessionRepository, StatsRepository};
use tracing::{debug, info, warn};

use super::active::{ActiveExam, SessionAction};
use super::plan;
use crate::Clock;
use crate::error::SessionError;
use crate::history::refresh_stats;

/// Result of starting a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub exam: ActiveExam,
    /// The stored session for this bank and mode was picked up again.
    pub resumed: bool,
    /// A session for another bank or mode was overwritten.
    pub replaced: bool,
}

fn fresh_orders(bank: &QuestionBank, mode: ExamMode) -> (Vec<usize>, BTreeMap<usize, Vec<usize>>) {
    let mut rng = rand::rng();
    let order = plan::question_order(bank.len(), mode, bank.shuffle_questions(), &mut rng);
    let options = plan::option_orders(bank, &mut rng);
    (order, options)
}

/// Orchestrates the single in-flight session: start or resume, checkpoint, submit.
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    banks: Arc<dyn BankRepository>,
    attempts: Arc<dyn AttemptRepository>,
    sessions: Arc<dyn SessionRepository>,
    stats: Arc<dyn StatsRepository>,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        banks: Arc<dyn BankRepository>,
        attempts: Arc<dyn AttemptRepository>,
        sessions: Arc<dyn SessionRepository>,
        stats: Arc<dyn StatsRepository>,
    ) -> Self {
        Self {
            clock,
            banks,
            attempts,
            sessions,
            stats,
        }
    }

    /// Start a quiz, resuming the stored session when it belongs to this bank and mode.
    ///
    /// A stored session that no longer fits the bank is dropped and a fresh one started.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownBank` if the bank does not exist and
    /// `SessionError::Storage` if persistence fails.
    pub async fn start(&self, bank_id: &BankId, mode: ExamMode) -> Result<StartOutcome, SessionError> {
        let bank = self
            .banks
            .get_bank(bank_id)
            .await?
            .ok_or_else(|| SessionError::UnknownBank(bank_id.clone()))?;

        let mut replaced = false;
        if let Some(stored) = self.sessions.load_session().await? {
            if !stored.matches(bank_id, mode) {
                info!(
                    previous_bank = %stored.bank_id,
                    previous_mode = %stored.mode,
                    "replacing session for another quiz"
                );
                replaced = true;
            } else if stored.fits(&bank) {
                info!(bank_id = %bank_id, %mode, position = stored.position, "resuming session");
                return Ok(StartOutcome {
                    exam: ActiveExam::new(bank, stored),
                    resumed: true,
                    replaced: false,
                });
            } else {
                warn!(bank_id = %bank_id, "stored session no longer fits its bank, starting over");
            }
        }

        let now = self.clock.now();
        let (order, option_orders) = fresh_orders(&bank, mode);
        let session = ExamSession::new(
            AttemptId::generate(now),
            &bank,
            mode,
            now,
            order,
            option_orders,
        );
        self.sessions.save_session(&session).await?;
        info!(bank_id = %bank_id, %mode, session_id = %session.id, "started session");

        Ok(StartOutcome {
            exam: ActiveExam::new(bank, session),
            resumed: false,
            replaced,
        })
    }

    /// Apply an interaction and checkpoint the result right away.
    ///
    /// # Errors
    ///
    /// Returns the action's `SessionError`, in which case nothing is written,
    /// or `SessionError::Storage` if the checkpoint fails.
    pub async fn apply(&self, exam: &mut ActiveExam, action: SessionAction) -> Result<(), SessionError> {
        exam.apply(action)?;
        self.checkpoint(exam).await
    }

    /// Write the full session snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn checkpoint(&self, exam: &ActiveExam) -> Result<(), SessionError> {
        self.sessions.save_session(exam.session()).await?;
        debug!(session_id = %exam.session().id, position = exam.position(), "checkpointed session");
        Ok(())
    }

    /// Grade the session, store the attempt, clear the slot and refresh stats.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn submit(&self, exam: ActiveExam) -> Result<ExamAttempt, SessionError> {
        let (bank, session) = exam.into_parts();
        let attempt = grade_attempt(&bank, &session, self.clock.now());

        self.attempts.upsert_attempt(&attempt).await?;
        self.sessions.clear_session().await?;
        refresh_stats(self.attempts.as_ref(), self.stats.as_ref()).await?;

        info!(
            attempt_id = %attempt.id,
            bank_id = %attempt.question_bank_id,
            score = attempt.score,
            "submitted attempt"
        );
        Ok(attempt)
    }

    /// Abandon the in-flight session without recording an attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn discard(&self) -> Result<(), SessionError> {
        self.sessions.clear_session().await?;
        info!("discarded session");
        Ok(())
    }

    /// The stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the backend cannot be read.
    pub async fn current_session(&self) -> Result<Option<ExamSession>, SessionError> {
        Ok(self.sessions.load_session().await?)
    }
}
