use async_trait::async_trait;
use exam_core::model::{AttemptId, BankId, ExamAttempt, ExamSession, QuestionBank, UserStats};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::kv::{
    ALL_KEYS, ATTEMPTS_KEY, CURRENT_SESSION_KEY, InMemoryStore, KeyValueStore, QUESTION_BANKS_KEY,
    USER_STATS_KEY,
};
use crate::records::SessionRecord;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for question banks.
#[async_trait]
pub trait BankRepository: Send + Sync {
    /// All stored banks in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_banks(&self) -> Result<Vec<QuestionBank>, StorageError>;

    /// Fetch a bank by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_bank(&self, id: &BankId) -> Result<Option<QuestionBank>, StorageError>;

    /// Persist a bank, replacing one with the same ID in place.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be stored.
    async fn upsert_bank(&self, bank: &QuestionBank) -> Result<(), StorageError>;

    /// Remove a bank. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn delete_bank(&self, id: &BankId) -> Result<bool, StorageError>;

    /// Replace the whole collection.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn replace_banks(&self, banks: &[QuestionBank]) -> Result<(), StorageError>;
}

/// Repository contract for the attempt history, kept newest first.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_attempts(&self) -> Result<Vec<ExamAttempt>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_attempt(&self, id: &AttemptId) -> Result<Option<ExamAttempt>, StorageError>;

    /// Replace an attempt with the same ID in place, or put a new one at the front.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn upsert_attempt(&self, attempt: &ExamAttempt) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn replace_attempts(&self, attempts: &[ExamAttempt]) -> Result<(), StorageError>;
}

/// Single slot holding the in-flight session.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Load the stored session. Unreadable data counts as no session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_session(&self) -> Result<Option<ExamSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save_session(&self, session: &ExamSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Stored statistics, zeroed when nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_stats(&self) -> Result<UserStats, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the stats cannot be stored.
    async fn save_stats(&self, stats: &UserStats) -> Result<(), StorageError>;
}

/// Implements every repository on top of a [`KeyValueStore`], one JSON bucket per concern.
#[derive(Clone)]
pub struct KvRepository {
    store: Arc<dyn KeyValueStore>,
}

/// A list entry as stored. Unreadable entries are written back verbatim so
/// a single-item update never drops them.
#[derive(Serialize)]
#[serde(untagged)]
enum Entry<T> {
    Parsed(T),
    Unreadable(Value),
}

impl<T> Entry<T> {
    fn parsed(&self) -> Option<&T> {
        match self {
            Entry::Parsed(value) => Some(value),
            Entry::Unreadable(_) => None,
        }
    }

    fn into_parsed(self) -> Option<T> {
        match self {
            Entry::Parsed(value) => Some(value),
            Entry::Unreadable(_) => None,
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl KvRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read a list bucket as stored. A bucket that is not a JSON array reads as empty.
    async fn read_entries<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<Entry<T>>, StorageError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };
        let items: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable bucket");
                return Ok(Vec::new());
            }
        };

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match T::deserialize(&item) {
                Ok(value) => Entry::Parsed(value),
                Err(e) => {
                    warn!(key, index, error = %e, "skipping unreadable entry");
                    Entry::Unreadable(item)
                }
            })
            .collect())
    }

    /// Readable entries of a list bucket.
    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(self
            .read_entries(key)
            .await?
            .into_iter()
            .filter_map(Entry::into_parsed)
            .collect())
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.store.set(key, &encode(value)?).await
    }
}

#[async_trait]
impl BankRepository for KvRepository {
    async fn list_banks(&self) -> Result<Vec<QuestionBank>, StorageError> {
        self.read_list(QUESTION_BANKS_KEY).await
    }

    async fn get_bank(&self, id: &BankId) -> Result<Option<QuestionBank>, StorageError> {
        let banks = self.list_banks().await?;
        Ok(banks.into_iter().find(|b| b.id() == id))
    }

    async fn upsert_bank(&self, bank: &QuestionBank) -> Result<(), StorageError> {
        let mut banks = self.read_entries::<QuestionBank>(QUESTION_BANKS_KEY).await?;
        match banks
            .iter()
            .position(|e| e.parsed().is_some_and(|b| b.id() == bank.id()))
        {
            Some(index) => banks[index] = Entry::Parsed(bank.clone()),
            None => banks.push(Entry::Parsed(bank.clone())),
        }
        self.write(QUESTION_BANKS_KEY, &banks).await
    }

    async fn delete_bank(&self, id: &BankId) -> Result<bool, StorageError> {
        let mut banks = self.read_entries::<QuestionBank>(QUESTION_BANKS_KEY).await?;
        let before = banks.len();
        banks.retain(|e| e.parsed().is_none_or(|b| b.id() != id));
        if banks.len() == before {
            return Ok(false);
        }
        self.write(QUESTION_BANKS_KEY, &banks).await?;
        Ok(true)
    }

    async fn replace_banks(&self, banks: &[QuestionBank]) -> Result<(), StorageError> {
        self.write(QUESTION_BANKS_KEY, banks).await
    }
}

#[async_trait]
impl AttemptRepository for KvRepository {
    async fn list_attempts(&self) -> Result<Vec<ExamAttempt>, StorageError> {
        self.read_list(ATTEMPTS_KEY).await
    }

    async fn get_attempt(&self, id: &AttemptId) -> Result<Option<ExamAttempt>, StorageError> {
        let attempts = self.list_attempts().await?;
        Ok(attempts.into_iter().find(|a| &a.id == id))
    }

    async fn upsert_attempt(&self, attempt: &ExamAttempt) -> Result<(), StorageError> {
        let mut attempts = self.read_entries::<ExamAttempt>(ATTEMPTS_KEY).await?;
        match attempts
            .iter()
            .position(|e| e.parsed().is_some_and(|a| a.id == attempt.id))
        {
            Some(index) => attempts[index] = Entry::Parsed(attempt.clone()),
            None => attempts.insert(0, Entry::Parsed(attempt.clone())),
        }
        self.write(ATTEMPTS_KEY, &attempts).await
    }

    async fn replace_attempts(&self, attempts: &[ExamAttempt]) -> Result<(), StorageError> {
        self.write(ATTEMPTS_KEY, attempts).await
    }
}

#[async_trait]
impl SessionRepository for KvRepository {
    async fn load_session(&self) -> Result<Option<ExamSession>, StorageError> {
        let Some(raw) = self.store.get(CURRENT_SESSION_KEY).await? else {
            return Ok(None);
        };
        let session = serde_json::from_str::<SessionRecord>(&raw)
            .map_err(|e| StorageError::Serialization(e.to_string()))
            .and_then(SessionRecord::into_session);
        match session {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable session");
                Ok(None)
            }
        }
    }

    async fn save_session(&self, session: &ExamSession) -> Result<(), StorageError> {
        self.write(CURRENT_SESSION_KEY, &SessionRecord::from_session(session))
            .await
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        self.store.remove(CURRENT_SESSION_KEY).await
    }
}

#[async_trait]
impl StatsRepository for KvRepository {
    async fn load_stats(&self) -> Result<UserStats, StorageError> {
        let Some(raw) = self.store.get(USER_STATS_KEY).await? else {
            return Ok(UserStats::default());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable stats");
            UserStats::default()
        }))
    }

    async fn save_stats(&self, stats: &UserStats) -> Result<(), StorageError> {
        self.write(USER_STATS_KEY, stats).await
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub banks: Arc<dyn BankRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub stats: Arc<dyn StatsRepository>,
    store: Arc<dyn KeyValueStore>,
}

impl Storage {
    /// Build the repositories over any key-value backend.
    #[must_use]
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let repo = KvRepository::new(Arc::clone(&store));
        Self {
            banks: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            stats: Arc::new(repo),
            store,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// Write banks, attempts and stats in one backend call. `None` leaves a bucket untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails; nothing is written then.
    pub async fn write_snapshot(
        &self,
        banks: Option<&[QuestionBank]>,
        attempts: Option<&[ExamAttempt]>,
        stats: &UserStats,
    ) -> Result<(), StorageError> {
        let mut entries = Vec::with_capacity(3);
        if let Some(banks) = banks {
            entries.push((QUESTION_BANKS_KEY, encode(banks)?));
        }
        if let Some(attempts) = attempts {
            entries.push((ATTEMPTS_KEY, encode(attempts)?));
        }
        entries.push((USER_STATS_KEY, encode(stats)?));
        self.store.set_many(&entries).await
    }

    /// Remove every application bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        for key in ALL_KEYS {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{CorrectAnswer, ExamMode, QuestionDraft};
    use exam_core::time::fixed_now;
    use std::collections::BTreeMap;

    fn build_bank(id: &str) -> QuestionBank {
        let question = QuestionDraft::new(
            "Q",
            vec!["a".into(), "b".into()],
            CorrectAnswer::Single("a".into()),
        )
        .validate()
        .unwrap();
        QuestionBank::new(BankId::new(id), format!("Bank {id}"), vec![question], fixed_now())
            .unwrap()
    }

    fn build_attempt(id: &str, score: u32) -> ExamAttempt {
        ExamAttempt {
            id: AttemptId::new(id),
            question_bank_id: BankId::new("b1"),
            question_bank_name: "Bank b1".into(),
            mode: ExamMode::Exam,
            start_time: fixed_now(),
            end_time: Some(fixed_now()),
            answers: Vec::new(),
            total_questions: 1,
            correct_count: usize::from(score == 100),
            wrong_count: usize::from(score != 100),
            skipped_count: 0,
            score,
            completed: true,
            total_points: 1.0,
            earned_points: f64::from(score) / 100.0,
            section_scores: Vec::new(),
            passed: None,
        }
    }

    #[tokio::test]
    async fn upsert_bank_replaces_in_place() {
        let storage = Storage::in_memory();
        storage.banks.upsert_bank(&build_bank("a")).await.unwrap();
        storage.banks.upsert_bank(&build_bank("b")).await.unwrap();
        storage.banks.upsert_bank(&build_bank("a")).await.unwrap();

        let ids: Vec<_> = storage
            .banks
            .list_banks()
            .await
            .unwrap()
            .iter()
            .map(|b| b.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, ["a", "b"]);

        assert!(storage.banks.delete_bank(&BankId::new("a")).await.unwrap());
        assert!(!storage.banks.delete_bank(&BankId::new("a")).await.unwrap());
        assert!(storage.banks.get_bank(&BankId::new("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_attempts_go_first() {
        let storage = Storage::in_memory();
        storage
            .attempts
            .upsert_attempt(&build_attempt("old", 50))
            .await
            .unwrap();
        storage
            .attempts
            .upsert_attempt(&build_attempt("new", 100))
            .await
            .unwrap();
        storage
            .attempts
            .upsert_attempt(&build_attempt("old", 75))
            .await
            .unwrap();

        let attempts = storage.attempts.list_attempts().await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].id, AttemptId::new("new"));
        assert_eq!(attempts[1].score, 75);
    }

    #[tokio::test]
    async fn corrupt_buckets_read_as_defaults() {
        let store = Arc::new(InMemoryStore::new());
        store.set(QUESTION_BANKS_KEY, "{not json").await.unwrap();
        store.set(USER_STATS_KEY, "[]").await.unwrap();
        store.set(CURRENT_SESSION_KEY, r#"{"id": 1}"#).await.unwrap();
        let storage = Storage::with_store(store);

        assert!(storage.banks.list_banks().await.unwrap().is_empty());
        assert_eq!(storage.stats.load_stats().await.unwrap(), UserStats::default());
        assert!(storage.sessions.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_entries_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let good = serde_json::to_value(build_bank("ok")).unwrap();
        let text = serde_json::to_string(&vec![good, serde_json::json!({"id": "broken"})]).unwrap();
        store.set(QUESTION_BANKS_KEY, &text).await.unwrap();
        let storage = Storage::with_store(store);

        let banks = storage.banks.list_banks().await.unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].id().as_str(), "ok");
    }

    #[tokio::test]
    async fn updates_keep_unreadable_entries() {
        let store = Arc::new(InMemoryStore::new());
        let broken = serde_json::json!({"id": "broken"});
        let good = serde_json::to_value(build_bank("ok")).unwrap();
        let text = serde_json::to_string(&vec![broken.clone(), good]).unwrap();
        store.set(QUESTION_BANKS_KEY, &text).await.unwrap();
        store
            .set(ATTEMPTS_KEY, &serde_json::to_string(&vec![broken.clone()]).unwrap())
            .await
            .unwrap();
        let storage = Storage::with_store(Arc::clone(&store) as Arc<dyn KeyValueStore>);

        storage.banks.upsert_bank(&build_bank("new")).await.unwrap();
        assert!(storage.banks.delete_bank(&BankId::new("ok")).await.unwrap());
        storage
            .attempts
            .upsert_attempt(&build_attempt("a1", 100))
            .await
            .unwrap();

        let raw_banks: Vec<Value> =
            serde_json::from_str(&store.get(QUESTION_BANKS_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(raw_banks.len(), 2);
        assert_eq!(raw_banks[0], broken);
        assert_eq!(raw_banks[1]["id"], "new");

        let raw_attempts: Vec<Value> =
            serde_json::from_str(&store.get(ATTEMPTS_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(raw_attempts.len(), 2);
        assert_eq!(raw_attempts[0]["id"], "a1");
        assert_eq!(raw_attempts[1], broken);
        assert_eq!(storage.attempts.list_attempts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_slot_round_trips_and_clears() {
        let storage = Storage::in_memory();
        let bank = build_bank("a");
        let mut session = ExamSession::new(
            AttemptId::new("s1"),
            &bank,
            ExamMode::Practice,
            fixed_now(),
            vec![0],
            BTreeMap::new(),
        );
        session.answers.insert(0, vec!["a".into()]);
        session.checked.insert(0);

        storage.sessions.save_session(&session).await.unwrap();
        assert_eq!(storage.sessions.load_session().await.unwrap(), Some(session));

        storage.sessions.clear_session().await.unwrap();
        assert!(storage.sessions.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_and_clear_all() {
        let storage = Storage::in_memory();
        storage.banks.upsert_bank(&build_bank("keep")).await.unwrap();
        let attempts = vec![build_attempt("a1", 100)];
        let stats = UserStats::from_attempts(&attempts);

        storage
            .write_snapshot(None, Some(&attempts), &stats)
            .await
            .unwrap();
        assert_eq!(storage.banks.list_banks().await.unwrap().len(), 1);
        assert_eq!(storage.attempts.list_attempts().await.unwrap(), attempts);
        assert_eq!(storage.stats.load_stats().await.unwrap().average_score, 100);

        storage.clear_all().await.unwrap();
        assert!(storage.banks.list_banks().await.unwrap().is_empty());
        assert!(storage.attempts.list_attempts().await.unwrap().is_empty());
        assert_eq!(storage.stats.load_stats().await.unwrap(), UserStats::default());
    }
}
