use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("missing or empty '{0}' field")]
    MissingField(&'static str),

    #[error("at least 2 options are required, found {count}")]
    TooFewOptions { count: usize },

    #[error("option {index} is empty")]
    BlankOption { index: usize },

    #[error("correct answer '{answer}' is not one of the options")]
    UnknownAnswer { answer: String },

    #[error("weight must be a non-negative number, got {0}")]
    InvalidWeight(f64),
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Correct answer as written in a bank file: a single text, a comma-separated
/// list of texts, or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(String),
    Multiple(Vec<String>),
}

impl CorrectAnswer {
    /// Answer texts trimmed and lowercased; a single text is split on commas.
    #[must_use]
    pub fn normalized(&self) -> Vec<String> {
        match self {
            CorrectAnswer::Single(text) => text.split(',').map(normalize_text).collect(),
            CorrectAnswer::Multiple(texts) => texts.iter().map(|t| normalize_text(t)).collect(),
        }
    }

    /// Answer texts trimmed but with their original casing, for display.
    #[must_use]
    pub fn display(&self) -> Vec<String> {
        match self {
            CorrectAnswer::Single(text) => text.split(',').map(|t| t.trim().to_owned()).collect(),
            CorrectAnswer::Multiple(texts) => texts.iter().map(|t| t.trim().to_owned()).collect(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            CorrectAnswer::Single(text) => text.trim().is_empty(),
            CorrectAnswer::Multiple(texts) => texts.iter().all(|t| t.trim().is_empty()),
        }
    }

    fn tokens(&self) -> Vec<String> {
        match self {
            CorrectAnswer::Single(text) => text.split(',').map(|t| t.trim().to_owned()).collect(),
            CorrectAnswer::Multiple(texts) => texts.iter().map(|t| t.trim().to_owned()).collect(),
        }
    }
}

/// Trim and lowercase a single answer text.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated multiple-choice question.
///
/// Options are always an ordered list and every correct answer names one of
/// them (compared trimmed and case-insensitively).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    question: String,
    options: Vec<String>,
    #[serde(rename = "correct_answer")]
    correct_answer: CorrectAnswer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<Difficulty>,
}

impl Question {
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &CorrectAnswer {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    #[must_use]
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    /// Points this question is worth. Missing or zero weight counts as 1.
    #[must_use]
    pub fn points(&self) -> f64 {
        match self.weight {
            Some(w) if w.is_finite() && w > 0.0 => w,
            _ => 1.0,
        }
    }

    /// True when more than one option must be selected.
    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.correct_answer.normalized().len() > 1
    }

    /// True when `option` is one of the correct answers.
    #[must_use]
    pub fn is_correct_option(&self, option: &str) -> bool {
        let needle = normalize_text(option);
        self.correct_answer.normalized().contains(&needle)
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Options as found in bank files: an ordered list or an object keyed by letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsDraft {
    List(Vec<String>),
    Keyed(BTreeMap<String, String>),
}

/// Unvalidated question as read from an upload, a remote source or a bank file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Option<OptionsDraft>,
    #[serde(default)]
    pub correct_answer: Option<CorrectAnswer>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub references: Option<Vec<String>>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl QuestionDraft {
    /// Starts a draft with the three required fields.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: CorrectAnswer,
    ) -> Self {
        Self {
            question: Some(question.into()),
            options: Some(OptionsDraft::List(options)),
            correct_answer: Some(correct_answer),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Validate and normalize into a `Question`.
    ///
    /// Keyed options become a list ordered by key, and letter keys used as
    /// correct answers are replaced by the option texts they name. Runs of
    /// whitespace in texts collapse to a single space.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if a required field is missing or empty, there
    /// are fewer than two options, an option is blank, a correct answer is not
    /// an option, or the weight is negative or not finite.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let question = self
            .question
            .as_deref()
            .map(collapse_whitespace)
            .filter(|q| !q.is_empty())
            .ok_or(QuestionError::MissingField("question"))?;

        let raw_options = self.options.ok_or(QuestionError::MissingField("options"))?;
        let mut correct_answer = self
            .correct_answer
            .filter(|c| !c.is_blank())
            .ok_or(QuestionError::MissingField("correct_answer"))?;

        let options: Vec<String> = match raw_options {
            OptionsDraft::List(list) => list.iter().map(|o| collapse_whitespace(o)).collect(),
            OptionsDraft::Keyed(keyed) => {
                correct_answer = resolve_keyed_answer(&correct_answer, &keyed);
                keyed.values().map(|o| collapse_whitespace(o)).collect()
            }
        };

        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: options.len(),
            });
        }
        if let Some(index) = options.iter().position(String::is_empty) {
            return Err(QuestionError::BlankOption { index });
        }

        let correct_answer = match correct_answer {
            CorrectAnswer::Single(text) => CorrectAnswer::Single(collapse_whitespace(&text)),
            CorrectAnswer::Multiple(texts) => {
                CorrectAnswer::Multiple(texts.iter().map(|t| collapse_whitespace(t)).collect())
            }
        };

        let known: HashSet<String> = options.iter().map(|o| normalize_text(o)).collect();
        if let Some(unknown) = correct_answer
            .normalized()
            .into_iter()
            .find(|answer| !known.contains(answer))
        {
            return Err(QuestionError::UnknownAnswer { answer: unknown });
        }

        if let Some(w) = self.weight {
            if !w.is_finite() || w < 0.0 {
                return Err(QuestionError::InvalidWeight(w));
            }
        }

        Ok(Question {
            question,
            options,
            correct_answer,
            explanation: clean_optional(self.explanation),
            references: self
                .references
                .unwrap_or_default()
                .into_iter()
                .map(|r| r.trim().to_owned())
                .filter(|r| !r.is_empty())
                .collect(),
            hint: clean_optional(self.hint),
            section: self
                .section
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            weight: self.weight,
            difficulty: self.difficulty.as_deref().and_then(Difficulty::parse_lenient),
        })
    }
}

fn clean_optional(text: Option<String>) -> Option<String> {
    text.map(|t| collapse_whitespace(&t)).filter(|t| !t.is_empty())
}

/// Replace letter keys ("A", "A, C") with the option texts they label.
///
/// Answers that are not all keys are left untouched so full-text answers keep working.
fn resolve_keyed_answer(answer: &CorrectAnswer, keyed: &BTreeMap<String, String>) -> CorrectAnswer {
    let tokens = answer.tokens();
    let resolved: Option<Vec<String>> = tokens
        .iter()
        .map(|token| {
            keyed
                .get(token)
                .or_else(|| keyed.get(&token.to_uppercase()))
                .cloned()
        })
        .collect();

    match resolved {
        Some(mut texts) if texts.len() == 1 => CorrectAnswer::Single(texts.remove(0)),
        Some(texts) => CorrectAnswer::Multiple(texts),
        None => answer.clone(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
