//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{BankError, BankId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `BankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankServiceError {
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures while talking to a remote bank source. Logged, never surfaced to callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("expected a JSON array")]
    NotAnArray,
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question bank {0} not found")]
    UnknownBank(BankId),
    #[error("question {position} is out of range")]
    OutOfRange { position: usize },
    #[error("option {option} is out of range")]
    OptionOutOfRange { option: usize },
    #[error("question {position} is locked after checking")]
    QuestionLocked { position: usize },
    #[error("select an option before checking the answer")]
    NothingSelected,
    #[error("answers can only be checked in practice mode")]
    NotPractice,
    #[error("question {position} has no hint")]
    NoHint { position: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TransferService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransferError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid backup: {0}")]
    InvalidDocument(String),
    #[error("question bank {index}: {source}")]
    Bank {
        index: usize,
        #[source]
        source: BankError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Banks(#[from] BankServiceError),
}
