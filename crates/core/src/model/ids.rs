use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the random suffix appended to generated identifiers.
const RANDOM_SUFFIX_LEN: usize = 9;

fn generate_raw(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &random[..RANDOM_SUFFIX_LEN])
}

/// Unique identifier for a question bank.
///
/// Banks fetched from a static source usually carry their file stem as id,
/// uploaded banks get a generated one.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankId(String);

impl BankId {
    /// Creates a new `BankId` from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id of the form `{unix_millis}-{random}`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(generate_raw(now))
    }

    /// Derives a stable id from a bank name: lowercase alphanumerics joined by `-`.
    /// Returns `None` when the name has no alphanumerics.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let slug = name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        (!slug.is_empty()).then_some(Self(slug))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for an exam attempt.
///
/// An in-flight session already owns the id its attempt will be stored under.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(String);

impl AttemptId {
    /// Creates a new `AttemptId` from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id of the form `{unix_millis}-{random}`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(generate_raw(now))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BankId({})", self.0)
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for BankId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "BankId".to_string(),
            });
        }
        Ok(Self::new(trimmed))
    }
}

impl FromStr for AttemptId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "AttemptId".to_string(),
            });
        }
        Ok(Self::new(trimmed))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn test_bank_id_display() {
        let id = BankId::new("aws-practitioner");
        assert_eq!(id.to_string(), "aws-practitioner");
    }

    #[test]
    fn test_bank_id_from_str_trims() {
        let id: BankId = "  networking  ".parse().unwrap();
        assert_eq!(id, BankId::new("networking"));
    }

    #[test]
    fn test_bank_id_from_name_is_stable() {
        let id = BankId::from_name("  AWS Cloud_Practitioner (2024) ").unwrap();
        assert_eq!(id.as_str(), "aws-cloud-practitioner-2024");
        assert_eq!(BankId::from_name("aws cloud practitioner 2024"), Some(id));
        assert_eq!(BankId::from_name(" -- "), None);
    }

    #[test]
    fn test_attempt_id_from_str_rejects_blank() {
        let result = "   ".parse::<AttemptId>();
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_id_shape() {
        let id = AttemptId::generate(fixed_now());
        let (millis, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(millis, "1700000000000");
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = BankId::generate(fixed_now());
        let b = BankId::generate(fixed_now());
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&BankId::new("b1")).unwrap();
        assert_eq!(json, "\"b1\"");
    }
}
