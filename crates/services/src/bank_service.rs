use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use exam_core::model::{BankDefaults, BankDraft, BankId, QuestionBank};
use storage::repository::BankRepository;
use tracing::info;

use crate::Clock;
use crate::error::BankServiceError;
use crate::source::BankSource;

const FALLBACK_BANK_NAME: &str = "Uploaded bank";

/// Bank name derived from an uploaded file name: the stem with `-` and `_` read as spaces.
#[must_use]
pub fn name_from_file(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = stem.replace(['-', '_'], " ");
    let name = name.trim();
    if name.is_empty() {
        FALLBACK_BANK_NAME.to_owned()
    } else {
        name.to_owned()
    }
}

/// Orchestrates bank ingestion and persistence.
#[derive(Clone)]
pub struct BankService {
    clock: Clock,
    banks: Arc<dyn BankRepository>,
}

impl BankService {
    #[must_use]
    pub fn new(clock: Clock, banks: Arc<dyn BankRepository>) -> Self {
        Self { clock, banks }
    }

    /// Validate an uploaded file and store it as a new bank.
    ///
    /// The bank always gets a fresh id. Metadata carried in object form wins
    /// over the defaults derived from the file name.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Bank` if the file is not a valid bank; nothing
    /// is stored in that case. Returns `BankServiceError::Storage` if persistence fails.
    pub async fn upload(
        &self,
        file_name: &str,
        contents: &str,
    ) -> Result<QuestionBank, BankServiceError> {
        let now = self.clock.now();
        let mut draft = BankDraft::from_upload(contents)?;
        draft.id = None;
        let bank = draft.validate(BankDefaults {
            id: BankId::generate(now),
            name: name_from_file(file_name),
            description: Some(format!("Uploaded from {file_name}")),
            date_added: now,
        })?;

        self.banks.upsert_bank(&bank).await?;
        info!(bank_id = %bank.id(), questions = bank.len(), "uploaded question bank");
        Ok(bank)
    }

    /// All stored banks.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Storage` if repository access fails.
    pub async fn list(&self) -> Result<Vec<QuestionBank>, BankServiceError> {
        Ok(self.banks.list_banks().await?)
    }

    /// Fetch a bank by ID.
    ///
    /// Returns `Ok(None)` when the bank does not exist.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Storage` if repository access fails.
    pub async fn get(&self, id: &BankId) -> Result<Option<QuestionBank>, BankServiceError> {
        Ok(self.banks.get_bank(id).await?)
    }

    /// Store a bank, replacing any bank with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Storage` if persistence fails.
    pub async fn save(&self, bank: &QuestionBank) -> Result<(), BankServiceError> {
        self.banks.upsert_bank(bank).await?;
        Ok(())
    }

    /// Delete a bank. Attempts made against it stay in the history.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Storage` if persistence fails.
    pub async fn delete(&self, id: &BankId) -> Result<bool, BankServiceError> {
        let removed = self.banks.delete_bank(id).await?;
        if removed {
            info!(bank_id = %id, "deleted question bank");
        }
        Ok(removed)
    }

    /// Add every bank from `source` whose id is not stored yet. Returns how many were added.
    ///
    /// Stored banks are never overwritten, so local copies survive a changed remote file.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Storage` if persistence fails.
    pub async fn sync_from_source(&self, source: &dyn BankSource) -> Result<usize, BankServiceError> {
        let fetched = source.fetch_banks().await;
        let mut known: HashSet<BankId> = self
            .banks
            .list_banks()
            .await?
            .iter()
            .map(|b| b.id().clone())
            .collect();

        let mut added = 0;
        for bank in fetched {
            if known.insert(bank.id().clone()) {
                self.banks.upsert_bank(&bank).await?;
                added += 1;
            }
        }
        info!(added, "synced question banks from source");
        Ok(added)
    }
}
