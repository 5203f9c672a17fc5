use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::bank_service::BankService;
use crate::error::AppServicesError;
use crate::history::HistoryService;
use crate::sessions::ExamSessionService;
use crate::source::{BankSourceConfig, HttpBankSource};
use crate::transfer::TransferService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    banks: Arc<BankService>,
    sessions: Arc<ExamSessionService>,
    history: Arc<HistoryService>,
    transfer: Arc<TransferService>,
    source: Option<Arc<HttpBankSource>>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(storage, clock))
    }

    /// Build services over an existing storage aggregate.
    ///
    /// The remote bank source is configured from the environment when present.
    #[must_use]
    pub fn with_storage(storage: Storage, clock: Clock) -> Self {
        let banks = Arc::new(BankService::new(clock, Arc::clone(&storage.banks)));
        let sessions = Arc::new(ExamSessionService::new(
            clock,
            Arc::clone(&storage.banks),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.stats),
        ));
        let history = Arc::new(HistoryService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.stats),
        ));
        let source = BankSourceConfig::from_env()
            .map(|config| Arc::new(HttpBankSource::new(config, clock)));
        let transfer = Arc::new(TransferService::new(clock, storage));

        Self {
            banks,
            sessions,
            history,
            transfer,
            source,
        }
    }

    /// Replace the remote bank source.
    #[must_use]
    pub fn with_source(mut self, source: Option<HttpBankSource>) -> Self {
        self.source = source.map(Arc::new);
        self
    }

    /// Pull banks from the configured source. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Banks` if persistence fails.
    pub async fn sync_banks(&self) -> Result<usize, AppServicesError> {
        let Some(source) = &self.source else {
            return Ok(0);
        };
        Ok(self.banks.sync_from_source(source.as_ref()).await?)
    }

    #[must_use]
    pub fn banks(&self) -> Arc<BankService> {
        Arc::clone(&self.banks)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<ExamSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn transfer(&self) -> Arc<TransferService> {
        Arc::clone(&self.transfer)
    }
}
