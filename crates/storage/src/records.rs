use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use exam_core::model::{AttemptId, BankId, ExamMode, ExamSession};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

/// Persisted shape of the in-flight session.
///
/// Index maps become JSON objects with decimal string keys and index sets
/// become arrays. Older writers sometimes stored indices as strings, so
/// reads accept both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub question_bank_id: String,
    pub question_bank_name: String,
    pub mode: ExamMode,
    pub current_question_index: IndexRepr,
    #[serde(default)]
    pub answers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub flagged_questions: Vec<IndexRepr>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub question_order: Vec<IndexRepr>,
    #[serde(default)]
    pub option_orders: BTreeMap<String, Vec<IndexRepr>>,
    #[serde(default)]
    pub hints_used: Vec<IndexRepr>,
    #[serde(default)]
    pub checked_questions: Vec<IndexRepr>,
}

/// An index written either as a JSON number or as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexRepr {
    Number(usize),
    Text(String),
}

impl IndexRepr {
    fn resolve(&self) -> Result<usize, StorageError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(raw) => parse_index(raw),
        }
    }
}

fn parse_index(raw: &str) -> Result<usize, StorageError> {
    raw.trim()
        .parse()
        .map_err(|_| StorageError::Serialization(format!("invalid index: {raw:?}")))
}

fn indices_to_array(set: &BTreeSet<usize>) -> Vec<IndexRepr> {
    set.iter().copied().map(IndexRepr::Number).collect()
}

fn indices_from_array(items: &[IndexRepr]) -> Result<BTreeSet<usize>, StorageError> {
    items.iter().map(IndexRepr::resolve).collect()
}

fn order_from_array(items: &[IndexRepr]) -> Result<Vec<usize>, StorageError> {
    items.iter().map(IndexRepr::resolve).collect()
}

fn answers_to_object(answers: &BTreeMap<usize, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    answers
        .iter()
        .map(|(index, selected)| (index.to_string(), selected.clone()))
        .collect()
}

fn answers_from_object(
    object: BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<usize, Vec<String>>, StorageError> {
    object
        .into_iter()
        .map(|(key, selected)| Ok((parse_index(&key)?, selected)))
        .collect()
}

fn orders_to_object(orders: &BTreeMap<usize, Vec<usize>>) -> BTreeMap<String, Vec<IndexRepr>> {
    orders
        .iter()
        .map(|(index, order)| {
            let order = order.iter().copied().map(IndexRepr::Number).collect();
            (index.to_string(), order)
        })
        .collect()
}

fn orders_from_object(
    object: &BTreeMap<String, Vec<IndexRepr>>,
) -> Result<BTreeMap<usize, Vec<usize>>, StorageError> {
    object
        .iter()
        .map(|(key, order)| Ok((parse_index(key)?, order_from_array(order)?)))
        .collect()
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &ExamSession) -> Self {
        Self {
            id: session.id.as_str().to_owned(),
            question_bank_id: session.bank_id.as_str().to_owned(),
            question_bank_name: session.bank_name.clone(),
            mode: session.mode,
            current_question_index: IndexRepr::Number(session.position),
            answers: answers_to_object(&session.answers),
            flagged_questions: indices_to_array(&session.flagged),
            start_time: session.started_at,
            time_limit: session.time_limit,
            question_order: session
                .question_order
                .iter()
                .copied()
                .map(IndexRepr::Number)
                .collect(),
            option_orders: orders_to_object(&session.option_orders),
            hints_used: indices_to_array(&session.hints_used),
            checked_questions: indices_to_array(&session.checked),
        }
    }

    /// Convert the record back into a domain session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any index is not a non-negative integer.
    pub fn into_session(self) -> Result<ExamSession, StorageError> {
        Ok(ExamSession {
            id: AttemptId::new(self.id),
            bank_id: BankId::new(self.question_bank_id),
            bank_name: self.question_bank_name,
            mode: self.mode,
            position: self.current_question_index.resolve()?,
            flagged: indices_from_array(&self.flagged_questions)?,
            hints_used: indices_from_array(&self.hints_used)?,
            checked: indices_from_array(&self.checked_questions)?,
            question_order: order_from_array(&self.question_order)?,
            option_orders: orders_from_object(&self.option_orders)?,
            answers: answers_from_object(self.answers)?,
            started_at: self.start_time,
            time_limit: self.time_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;
    use serde_json::json;

    fn sample_session() -> ExamSession {
        let mut answers = BTreeMap::new();
        answers.insert(2, vec!["b".to_owned()]);
        answers.insert(10, vec!["a".to_owned(), "c".to_owned()]);
        let mut option_orders = BTreeMap::new();
        option_orders.insert(2, vec![1, 0, 2]);
        ExamSession {
            id: AttemptId::new("1700000000000-abcdefghi"),
            bank_id: BankId::new("net"),
            bank_name: "Networking".to_owned(),
            mode: ExamMode::Practice,
            position: 1,
            answers,
            flagged: BTreeSet::from([10]),
            hints_used: BTreeSet::from([2]),
            checked: BTreeSet::from([2]),
            started_at: fixed_now(),
            time_limit: Some(30),
            question_order: (0..11).rev().collect(),
            option_orders,
        }
    }

    #[test]
    fn writes_objects_with_string_keys_and_arrays() {
        let record = SessionRecord::from_session(&sample_session());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["answers"]["10"], json!(["a", "c"]));
        assert_eq!(value["flaggedQuestions"], json!([10]));
        assert_eq!(value["optionOrders"]["2"], json!([1, 0, 2]));
        assert_eq!(value["currentQuestionIndex"], json!(1));
        assert_eq!(value["mode"], json!("practice"));
    }

    #[test]
    fn survives_a_json_round_trip() {
        let session = sample_session();
        let text = serde_json::to_string(&SessionRecord::from_session(&session)).unwrap();
        let record: SessionRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(record.into_session().unwrap(), session);
    }

    #[test]
    fn accepts_indices_written_as_strings() {
        let record: SessionRecord = serde_json::from_value(json!({
            "id": "a1",
            "questionBankId": "net",
            "questionBankName": "Networking",
            "mode": "exam",
            "currentQuestionIndex": "3",
            "answers": { "0": ["x"] },
            "flaggedQuestions": ["1", 2],
            "startTime": "2023-11-14T22:13:20Z",
            "questionOrder": ["1", "0", 3, 2],
        }))
        .unwrap();

        let session = record.into_session().unwrap();
        assert_eq!(session.position, 3);
        assert_eq!(session.flagged, BTreeSet::from([1, 2]));
        assert_eq!(session.question_order, vec![1, 0, 3, 2]);
        assert!(session.hints_used.is_empty());
        assert!(session.option_orders.is_empty());
    }

    #[test]
    fn rejects_non_numeric_keys() {
        let record: SessionRecord = serde_json::from_value(json!({
            "id": "a1",
            "questionBankId": "net",
            "questionBankName": "Networking",
            "mode": "exam",
            "currentQuestionIndex": 0,
            "answers": { "first": ["x"] },
            "startTime": "2023-11-14T22:13:20Z",
        }))
        .unwrap();

        assert!(matches!(
            record.into_session(),
            Err(StorageError::Serialization(_))
        ));
    }
}
