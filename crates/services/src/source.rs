use std::env;
use std::path::Path;

use async_trait::async_trait;
use exam_core::model::{BankDefaults, BankDraft, BankError, BankId, QuestionBank};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Clock;
use crate::bank_service::name_from_file;
use crate::error::SourceError;

const DEFAULT_API_PATH: &str = "/api/question-banks";
const DEFAULT_MANIFEST_PATH: &str = "/bank/manifest.json";
const DEFAULT_BANK_PATH: &str = "/bank/";
const UNTITLED_BANK: &str = "Untitled bank";

/// Somewhere question banks can be fetched from.
///
/// Fetching is best effort: failures are logged and the result is whatever
/// could be loaded, possibly nothing.
#[async_trait]
pub trait BankSource: Send + Sync {
    async fn fetch_banks(&self) -> Vec<QuestionBank>;
}

#[derive(Clone, Debug)]
pub struct BankSourceConfig {
    pub base_url: String,
    pub api_path: String,
    pub manifest_path: String,
    pub bank_path: String,
}

impl BankSourceConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_path: DEFAULT_API_PATH.into(),
            manifest_path: DEFAULT_MANIFEST_PATH.into(),
            bank_path: DEFAULT_BANK_PATH.into(),
        }
    }

    /// Reads `EXAM_BANK_SOURCE_URL`. Returns `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EXAM_BANK_SOURCE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url.trim()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn bank_file_url(&self, file: &str) -> String {
        let dir = self.bank_path.trim_end_matches('/');
        self.url(&format!("{dir}/{}", file.trim_start_matches('/')))
    }
}

/// Id for a collection entry: its own when present, otherwise derived from its
/// name so repeated syncs see the same bank.
fn collection_id(draft: &BankDraft) -> Option<BankId> {
    match draft.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Some(BankId::new(id)),
        _ => draft.name.as_deref().and_then(BankId::from_name),
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    file: String,
}

/// Loads banks over HTTP: the collection endpoint first, then the static manifest.
#[derive(Clone)]
pub struct HttpBankSource {
    client: Client,
    config: BankSourceConfig,
    clock: Clock,
}

impl HttpBankSource {
    #[must_use]
    pub fn new(config: BankSourceConfig, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            config,
            clock,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BankSourceConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn fetch_collection(&self) -> Result<Vec<QuestionBank>, SourceError> {
        let url = self.config.url(&self.config.api_path);
        let body: Value = self.get_json(&url).await?;
        let Value::Array(items) = body else {
            return Err(SourceError::NotAnArray);
        };

        let now = self.clock.now();
        let mut banks = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let bank = BankDraft::from_value(item).and_then(|draft| {
                let id = collection_id(&draft).ok_or(BankError::EmptyName)?;
                draft.validate(BankDefaults {
                    id,
                    name: UNTITLED_BANK.into(),
                    description: None,
                    date_added: now,
                })
            });
            match bank {
                Ok(bank) => banks.push(bank),
                Err(e) => warn!(index, error = %e, "skipping invalid bank from collection"),
            }
        }
        Ok(banks)
    }

    async fn fetch_manifest(&self) -> Result<Vec<QuestionBank>, SourceError> {
        let url = self.config.url(&self.config.manifest_path);
        let entries: Vec<Value> = self.get_json(&url).await?;

        let mut banks = Vec::with_capacity(entries.len());
        for entry in entries {
            let file = match serde_json::from_value::<ManifestEntry>(entry) {
                Ok(entry) => entry.file,
                Err(e) => {
                    warn!(error = %e, "skipping malformed manifest entry");
                    continue;
                }
            };
            match self.fetch_bank_file(&file).await {
                Ok(bank) => banks.push(bank),
                Err(e) => warn!(file, error = %e, "skipping bank file"),
            }
        }
        Ok(banks)
    }

    async fn fetch_bank_file(&self, file: &str) -> Result<QuestionBank, SourceError> {
        let body: Value = self.get_json(&self.config.bank_file_url(file)).await?;
        let stem = Path::new(file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file);
        let defaults = BankDefaults {
            id: BankId::new(stem),
            name: name_from_file(file),
            description: None,
            date_added: self.clock.now(),
        };
        Ok(BankDraft::from_value(body)?.validate(defaults)?)
    }
}

#[async_trait]
impl BankSource for HttpBankSource {
    async fn fetch_banks(&self) -> Vec<QuestionBank> {
        match self.fetch_collection().await {
            Ok(banks) => {
                info!(count = banks.len(), "loaded banks from collection endpoint");
                return banks;
            }
            Err(e) => debug!(error = %e, "collection endpoint unavailable, trying manifest"),
        }
        match self.fetch_manifest().await {
            Ok(banks) => {
                info!(count = banks.len(), "loaded banks from manifest");
                banks
            }
            Err(e) => {
                warn!(error = %e, "no bank source reachable");
                Vec::new()
            }
        }
    }
}
