use serde::{Deserialize, Serialize};
use serde_json::Value;
use storage::repository::Storage;
use tracing::info;

use exam_core::model::{
    BankDefaults, BankDraft, BankId, ExamAttempt, QuestionBank, UserStats,
};

use crate::Clock;
use crate::error::TransferError;

const UNTITLED_BANK: &str = "Imported bank";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    question_banks: &'a [QuestionBank],
    attempts: &'a [ExamAttempt],
    user_stats: &'a UserStats,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    #[serde(default)]
    question_banks: Option<Vec<Value>>,
    #[serde(default)]
    attempts: Option<Vec<ExamAttempt>>,
}

/// What an import wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub banks: Option<usize>,
    pub attempts: Option<usize>,
    pub stats: UserStats,
}

/// Whole-state backup and restore.
#[derive(Clone)]
pub struct TransferService {
    clock: Clock,
    storage: Storage,
}

impl TransferService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        Self { clock, storage }
    }

    /// Pretty-printed `{questionBanks, attempts, userStats}` document.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Storage` if reading or serializing fails.
    pub async fn export_all(&self) -> Result<String, TransferError> {
        let banks = self.storage.banks.list_banks().await?;
        let attempts = self.storage.attempts.list_attempts().await?;
        let stats = self.storage.stats.load_stats().await?;
        let document = ExportDocument {
            question_banks: &banks,
            attempts: &attempts,
            user_stats: &stats,
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| TransferError::Storage(storage::StorageError::Serialization(e.to_string())))
    }

    /// Restore a backup made by [`TransferService::export_all`].
    ///
    /// Present buckets are replaced wholesale and stats are recomputed. The
    /// whole document is validated before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `TransferError` for malformed input; storage is untouched then.
    pub async fn import_all(&self, json: &str) -> Result<ImportSummary, TransferError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| TransferError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(TransferError::InvalidDocument("expected a JSON object".into()));
        }
        let document: ImportDocument = serde_json::from_value(value)
            .map_err(|e| TransferError::InvalidDocument(e.to_string()))?;

        let banks = document
            .question_banks
            .map(|raw| self.validate_banks(raw))
            .transpose()?;

        let stats = match &document.attempts {
            Some(attempts) => UserStats::from_attempts(attempts),
            None => UserStats::from_attempts(&self.storage.attempts.list_attempts().await?),
        };

        self.storage
            .write_snapshot(banks.as_deref(), document.attempts.as_deref(), &stats)
            .await?;

        let summary = ImportSummary {
            banks: banks.as_ref().map(Vec::len),
            attempts: document.attempts.as_ref().map(Vec::len),
            stats,
        };
        info!(banks = ?summary.banks, attempts = ?summary.attempts, "imported backup");
        Ok(summary)
    }

    fn validate_banks(&self, raw: Vec<Value>) -> Result<Vec<QuestionBank>, TransferError> {
        let now = self.clock.now();
        raw.into_iter()
            .enumerate()
            .map(|(index, value)| {
                let defaults = BankDefaults {
                    id: BankId::generate(now),
                    name: UNTITLED_BANK.into(),
                    description: None,
                    date_added: now,
                };
                BankDraft::from_value(value)
                    .and_then(|draft| draft.validate(defaults))
                    .map_err(|source| TransferError::Bank { index, source })
            })
            .collect()
    }

    /// Remove every stored bucket.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Storage` if the backend cannot be written.
    pub async fn clear_all(&self) -> Result<(), TransferError> {
        self.storage.clear_all().await?;
        info!("cleared all stored data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AttemptId, CorrectAnswer, ExamMode, QuestionDraft};
    use exam_core::time::{fixed_clock, fixed_now};

    fn bank(id: &str) -> QuestionBank {
        let question = QuestionDraft::new(
            "Q",
            vec!["a".into(), "b".into()],
            CorrectAnswer::Multiple(vec!["a".into()]),
        )
        .with_weight(2.0)
        .validate()
        .unwrap();
        QuestionBank::new(BankId::new(id), format!("Bank {id}"), vec![question], fixed_now())
            .unwrap()
            .with_passing_score(Some(70.0))
    }

    fn attempt(id: &str, score: u32) -> ExamAttempt {
        ExamAttempt {
            id: AttemptId::new(id),
            question_bank_id: BankId::new("a"),
            question_bank_name: "Bank a".into(),
            mode: ExamMode::Practice,
            start_time: fixed_now(),
            end_time: Some(fixed_now()),
            answers: Vec::new(),
            total_questions: 2,
            correct_count: 1,
            wrong_count: 1,
            skipped_count: 0,
            score,
            completed: true,
            total_points: 2.0,
            earned_points: 1.0,
            section_scores: Vec::new(),
            passed: None,
        }
    }

    async fn seeded() -> (TransferService, Storage) {
        let storage = Storage::in_memory();
        storage.banks.upsert_bank(&bank("a")).await.unwrap();
        storage.attempts.upsert_attempt(&attempt("x", 50)).await.unwrap();
        storage
            .stats
            .save_stats(&UserStats::from_attempts(&[attempt("x", 50)]))
            .await
            .unwrap();
        (TransferService::new(fixed_clock(), storage.clone()), storage)
    }

    #[tokio::test]
    async fn export_then_import_into_empty_storage() {
        let (svc, _) = seeded().await;
        let exported = svc.export_all().await.unwrap();
        let doc: Value = serde_json::from_str(&exported).unwrap();
        assert!(doc["questionBanks"].is_array());
        assert_eq!(doc["userStats"]["averageScore"], 50);
        assert!(exported.contains("\n  "));

        let target = Storage::in_memory();
        let restore = TransferService::new(fixed_clock(), target.clone());
        let summary = restore.import_all(&exported).await.unwrap();
        assert_eq!(summary.banks, Some(1));
        assert_eq!(summary.attempts, Some(1));
        assert_eq!(target.banks.list_banks().await.unwrap(), vec![bank("a")]);
        assert_eq!(target.stats.load_stats().await.unwrap().average_score, 50);
    }

    #[tokio::test]
    async fn import_without_attempts_keeps_history_and_recomputes() {
        let (svc, storage) = seeded().await;
        let summary = svc
            .import_all(r#"{"questionBanks": []}"#)
            .await
            .unwrap();
        assert_eq!(summary.banks, Some(0));
        assert_eq!(summary.attempts, None);
        assert!(storage.banks.list_banks().await.unwrap().is_empty());
        assert_eq!(storage.attempts.list_attempts().await.unwrap().len(), 1);
        assert_eq!(storage.stats.load_stats().await.unwrap().total_attempts, 1);
    }

    #[tokio::test]
    async fn malformed_import_changes_nothing() {
        let (svc, storage) = seeded().await;
        let before = svc.export_all().await.unwrap();

        for input in [
            "not json",
            "[1, 2]",
            r#"{"attempts": [{"id": 1}]}"#,
            r#"{"questionBanks": [{"id": "b", "name": "B", "questions": [{"question": "Q", "options": ["a"], "correct_answer": "a"}]}], "attempts": []}"#,
        ] {
            assert!(svc.import_all(input).await.is_err(), "{input}");
        }

        assert_eq!(svc.export_all().await.unwrap(), before);
        assert_eq!(storage.banks.list_banks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_every_bucket() {
        let (svc, storage) = seeded().await;
        svc.clear_all().await.unwrap();
        assert!(storage.banks.list_banks().await.unwrap().is_empty());
        assert!(storage.attempts.list_attempts().await.unwrap().is_empty());
        assert_eq!(storage.stats.load_stats().await.unwrap(), UserStats::default());
    }
}
