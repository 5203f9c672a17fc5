#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank_service;
pub mod error;
pub mod history;
pub mod sessions;
pub mod source;
pub mod transfer;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use bank_service::BankService;
pub use error::{AppServicesError, BankServiceError, SessionError, SourceError, TransferError};
pub use history::HistoryService;
pub use sessions::{
    ActiveExam, Autosave, ExamSessionService, QuestionView, SessionAction, SessionProgress,
    StartOutcome,
};
pub use source::{BankSource, BankSourceConfig, HttpBankSource};
pub use transfer::{ImportSummary, TransferService};
