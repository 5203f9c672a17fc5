mod attempt;
mod bank;
mod ids;
mod question;
mod session;
mod stats;

pub use attempt::{ExamAttempt, ExamMode, SectionScore, UserAnswer};
pub use bank::{BankDefaults, BankDraft, BankError, ExamSection, QuestionBank};
pub use ids::{AttemptId, BankId, ParseIdError};
pub use question::{
    CorrectAnswer, Difficulty, OptionsDraft, Question, QuestionDraft, QuestionError,
    normalize_text,
};
pub use session::{ExamSession, is_permutation};
pub use stats::UserStats;
