mod active;
mod autosave;
pub mod plan;
mod progress;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use active::{ActiveExam, OptionFeedback, OptionView, QuestionView, SessionAction};
pub use autosave::{AUTOSAVE_INTERVAL, Autosave};
pub use progress::{QuestionStatus, SessionProgress};
pub use workflow::{ExamSessionService, StartOutcome};
