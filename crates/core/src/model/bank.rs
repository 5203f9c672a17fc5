use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ids::BankId;
use crate::model::question::{Question, QuestionDraft, QuestionError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum BankError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error(
        "invalid format: expected an array of questions or an object with a 'questions' array"
    )]
    InvalidFormat,

    #[error("invalid value for '{field}': {message}")]
    InvalidMetadata { field: String, message: String },

    #[error("bank name cannot be empty")]
    EmptyName,

    #[error("bank contains no questions")]
    NoQuestions,

    #[error("question {number}: {source}")]
    Question {
        number: usize,
        #[source]
        source: QuestionError,
    },

    #[error("question {number}: {message}")]
    MalformedQuestion { number: usize, message: String },
}

//
// ─── SECTIONS ──────────────────────────────────────────────────────────────────
//

/// A named part of an exam.
///
/// `weight` is the percentage shown next to the section. It is carried into
/// attempt results as-is and does not re-weight the overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
}

impl ExamSection {
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            description: None,
            weight,
            question_count: None,
        }
    }
}

//
// ─── BANK ──────────────────────────────────────────────────────────────────────
//

/// An ordered collection of questions plus exam settings.
///
/// Banks are immutable once created; edits replace the whole bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    id: BankId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    questions: Vec<Question>,
    date_added: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sections: Vec<ExamSection>,
    #[serde(default)]
    shuffle_questions: bool,
    #[serde(default)]
    shuffle_options: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passing_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_limit: Option<u32>,
}

impl QuestionBank {
    /// Creates a bank with default settings (no sections, no shuffling, no pass mark, untimed).
    ///
    /// # Errors
    ///
    /// Returns `BankError::EmptyName` if name is blank and `BankError::NoQuestions`
    /// if `questions` is empty.
    pub fn new(
        id: BankId,
        name: impl Into<String>,
        questions: Vec<Question>,
        date_added: DateTime<Utc>,
    ) -> Result<Self, BankError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BankError::EmptyName);
        }
        if questions.is_empty() {
            return Err(BankError::NoQuestions);
        }

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            description: None,
            questions,
            date_added,
            sections: Vec::new(),
            shuffle_questions: false,
            shuffle_options: false,
            passing_score: None,
            time_limit: None,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        self
    }

    #[must_use]
    pub fn with_sections(mut self, sections: Vec<ExamSection>) -> Self {
        self.sections = sections;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, questions: bool, options: bool) -> Self {
        self.shuffle_questions = questions;
        self.shuffle_options = options;
        self
    }

    #[must_use]
    pub fn with_passing_score(mut self, passing_score: Option<f64>) -> Self {
        self.passing_score = passing_score;
        self
    }

    /// Time limit in minutes. Informational only.
    #[must_use]
    pub fn with_time_limit(mut self, minutes: Option<u32>) -> Self {
        self.time_limit = minutes.filter(|m| *m > 0);
        self
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &BankId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn date_added(&self) -> DateTime<Utc> {
        self.date_added
    }

    #[must_use]
    pub fn sections(&self) -> &[ExamSection] {
        &self.sections
    }

    #[must_use]
    pub fn shuffle_questions(&self) -> bool {
        self.shuffle_questions
    }

    #[must_use]
    pub fn shuffle_options(&self) -> bool {
        self.shuffle_options
    }

    #[must_use]
    pub fn passing_score(&self) -> Option<f64> {
        self.passing_score
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<u32> {
        self.time_limit
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Fallbacks applied when a bank document omits identity fields.
#[derive(Debug, Clone)]
pub struct BankDefaults {
    pub id: BankId,
    pub name: String,
    pub description: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// Unvalidated bank document.
///
/// Questions are kept as raw JSON so a failure can name the offending question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<Value>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub sections: Option<Vec<ExamSection>>,
    #[serde(default)]
    pub shuffle_questions: Option<bool>,
    #[serde(default)]
    pub shuffle_options: Option<bool>,
    #[serde(default)]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub time_limit: Option<u32>,
}

impl BankDraft {
    /// Interpret uploaded text as a bank.
    ///
    /// Accepts an array of questions, an object with a `questions` array (bank
    /// metadata next to it is kept), or a single question object.
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidJson` if the text is not JSON and
    /// `BankError::InvalidFormat` if it has none of the accepted shapes.
    pub fn from_upload(text: &str) -> Result<Self, BankError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| BankError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Same as [`BankDraft::from_upload`] for an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidFormat` if the value has none of the accepted shapes
    /// and `BankError::InvalidMetadata` if a bank field next to `questions` has the wrong type.
    pub fn from_value(value: Value) -> Result<Self, BankError> {
        if let Value::Array(questions) = value {
            return Ok(Self {
                questions,
                ..Self::default()
            });
        }
        if value.get("questions").is_some_and(Value::is_array) {
            return serde_json::from_value(value.clone())
                .map_err(|e| metadata_error(value.as_object(), &e));
        }
        if value.get("question").is_some() {
            return Ok(Self {
                questions: vec![value],
                ..Self::default()
            });
        }
        Err(BankError::InvalidFormat)
    }

    /// Validate every question and build the bank.
    ///
    /// # Errors
    ///
    /// Returns the first failing question as `BankError::Question` (numbered from 1),
    /// or `BankError::NoQuestions` / `BankError::EmptyName`.
    pub fn validate(self, defaults: BankDefaults) -> Result<QuestionBank, BankError> {
        if self.questions.is_empty() {
            return Err(BankError::NoQuestions);
        }

        let mut questions = Vec::with_capacity(self.questions.len());
        for (idx, raw) in self.questions.into_iter().enumerate() {
            let number = idx + 1;
            let draft: QuestionDraft = serde_json::from_value(raw)
                .map_err(|e| BankError::MalformedQuestion {
                    number,
                    message: e.to_string(),
                })?;
            let question = draft
                .validate()
                .map_err(|source| BankError::Question { number, source })?;
            questions.push(question);
        }

        let id = self
            .id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .map_or(defaults.id, BankId::new);
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(defaults.name);
        let date_added = self
            .date_added
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map_or(defaults.date_added, |d| d.with_timezone(&Utc));

        Ok(QuestionBank::new(id, name, questions, date_added)?
            .with_description(self.description.or(defaults.description))
            .with_sections(self.sections.unwrap_or_default())
            .with_shuffle(
                self.shuffle_questions.unwrap_or(false),
                self.shuffle_options.unwrap_or(false),
            )
            .with_passing_score(self.passing_score)
            .with_time_limit(self.time_limit))
    }
}

/// Name the first top-level field that fails to deserialize on its own.
fn metadata_error(fields: Option<&Map<String, Value>>, err: &serde_json::Error) -> BankError {
    let field = fields
        .into_iter()
        .flatten()
        .find(|(key, value)| {
            let single: Map<String, Value> =
                [((*key).clone(), (*value).clone())].into_iter().collect();
            serde_json::from_value::<BankDraft>(Value::Object(single)).is_err()
        })
        .map_or_else(|| "bank".to_owned(), |(key, _)| key.clone());
    BankError::InvalidMetadata {
        field,
        message: err.to_string(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
