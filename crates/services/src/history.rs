use std::sync::Arc;

use chrono::{DateTime, Utc};
use exam_core::model::{AttemptId, BankId, ExamAttempt, UserStats};
use storage::repository::{AttemptRepository, StatsRepository, StorageError};
use tracing::debug;

/// Recompute stats from the full history and store them.
pub(crate) async fn refresh_stats(
    attempts: &dyn AttemptRepository,
    stats: &dyn StatsRepository,
) -> Result<UserStats, StorageError> {
    let history = attempts.list_attempts().await?;
    let fresh = UserStats::from_attempts(&history);
    stats.save_stats(&fresh).await?;
    debug!(total_attempts = fresh.total_attempts, "refreshed user stats");
    Ok(fresh)
}

/// Read side of the attempt history.
#[derive(Clone)]
pub struct HistoryService {
    attempts: Arc<dyn AttemptRepository>,
    stats: Arc<dyn StatsRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>, stats: Arc<dyn StatsRepository>) -> Self {
        Self { attempts, stats }
    }

    /// Every attempt, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn attempts(&self) -> Result<Vec<ExamAttempt>, StorageError> {
        self.attempts.list_attempts().await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn attempt(&self, id: &AttemptId) -> Result<Option<ExamAttempt>, StorageError> {
        self.attempts.get_attempt(id).await
    }

    /// Attempts against one bank, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn attempts_for_bank(&self, bank_id: &BankId) -> Result<Vec<ExamAttempt>, StorageError> {
        let mut attempts = self.attempts.list_attempts().await?;
        attempts.retain(|a| &a.question_bank_id == bank_id);
        Ok(attempts)
    }

    /// The `limit` newest attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ExamAttempt>, StorageError> {
        let mut attempts = self.attempts.list_attempts().await?;
        attempts.truncate(limit);
        Ok(attempts)
    }

    /// Highest completed score for a bank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn best_score(&self, bank_id: &BankId) -> Result<Option<u32>, StorageError> {
        let attempts = self.attempts_for_bank(bank_id).await?;
        Ok(attempts
            .iter()
            .filter(|a| a.completed)
            .map(|a| a.score)
            .max())
    }

    /// When the bank was last submitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn last_attempt_date(
        &self,
        bank_id: &BankId,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let attempts = self.attempts_for_bank(bank_id).await?;
        Ok(attempts.iter().filter_map(|a| a.end_time).max())
    }

    /// Stored aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn stats(&self) -> Result<UserStats, StorageError> {
        self.stats.load_stats().await
    }

    /// Rebuild the statistics from the history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    pub async fn recompute_stats(&self) -> Result<UserStats, StorageError> {
        refresh_stats(self.attempts.as_ref(), self.stats.as_ref()).await
    }
}
