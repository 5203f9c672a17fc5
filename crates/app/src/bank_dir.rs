use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use exam_core::model::{BankDefaults, BankDraft, BankError, BankId, QuestionBank};
use serde_json::Value;
use services::bank_service::name_from_file;
use thiserror::Error;
use tracing::warn;

/// File written by the `manifest` command; never served as a bank.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankFileError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// A bank file together with the bank it holds.
#[derive(Debug, Clone)]
pub struct BankFile {
    pub file: String,
    pub bank: QuestionBank,
}

/// Directory of `*.json` bank files.
#[derive(Debug, Clone)]
pub struct BankDirectory {
    root: PathBuf,
}

fn is_bank_file(path: &Path) -> bool {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let is_manifest = path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE);
    is_json && !is_manifest
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or_default()
}

impl BankDirectory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bank files sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the directory cannot be read.
    pub async fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_bank_file(&path) && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse one file. A missing id falls back to the file stem and a
    /// missing `dateAdded` to the file's modification time.
    ///
    /// # Errors
    ///
    /// Returns `BankFileError` if the file cannot be read or is not a valid bank.
    pub async fn load(&self, path: &Path) -> Result<BankFile, BankFileError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

        let name = file_name(path);
        let bank = BankDraft::from_value(value)?.validate(BankDefaults {
            id: BankId::new(file_stem(path)),
            name: name_from_file(name),
            description: None,
            date_added: modified,
        })?;
        Ok(BankFile {
            file: name.to_owned(),
            bank,
        })
    }

    /// Every valid bank. Files that fail to load are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the directory cannot be read.
    pub async fn load_all(&self) -> io::Result<Vec<BankFile>> {
        let mut banks = Vec::new();
        for path in self.files().await? {
            match self.load(&path).await {
                Ok(bank) => banks.push(bank),
                Err(e) => warn!(file = %path.display(), error = %e, "skipping bank file"),
            }
        }
        Ok(banks)
    }

    /// Find a bank by file stem first, then by the id stored inside the file.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the directory cannot be read.
    pub async fn find(&self, id: &str) -> io::Result<Option<QuestionBank>> {
        let files = self.files().await?;
        if let Some(path) = files.iter().find(|p| file_stem(p) == id) {
            match self.load(path).await {
                Ok(file) => return Ok(Some(file.bank)),
                Err(e) => warn!(file = %path.display(), error = %e, "skipping bank file"),
            }
        }
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .map(|f| f.bank)
            .find(|b| b.id().as_str() == id))
    }
}
