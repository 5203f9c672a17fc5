use std::collections::BTreeMap;

use exam_core::model::{
    AttemptId, BankId, CorrectAnswer, ExamAttempt, ExamMode, ExamSession, QuestionBank,
    QuestionDraft, UserStats,
};
use exam_core::time::fixed_now;
use storage::kv::{KeyValueStore, QUESTION_BANKS_KEY};
use storage::repository::Storage;
use storage::sqlite::SqliteStore;

fn build_bank(id: &str) -> QuestionBank {
    let questions = (1..=3)
        .map(|n| {
            QuestionDraft::new(
                format!("Question {n}"),
                vec!["alpha".into(), "beta".into(), "gamma".into()],
                CorrectAnswer::Single("beta".into()),
            )
            .validate()
            .unwrap()
        })
        .collect();
    QuestionBank::new(BankId::new(id), "Sqlite bank", questions, fixed_now()).unwrap()
}

fn build_attempt(id: &str) -> ExamAttempt {
    ExamAttempt {
        id: AttemptId::new(id),
        question_bank_id: BankId::new("net"),
        question_bank_name: "Sqlite bank".into(),
        mode: ExamMode::Exam,
        start_time: fixed_now(),
        end_time: Some(fixed_now() + chrono::Duration::minutes(4)),
        answers: Vec::new(),
        total_questions: 3,
        correct_count: 2,
        wrong_count: 1,
        skipped_count: 0,
        score: 67,
        completed: true,
        total_points: 3.0,
        earned_points: 2.0,
        section_scores: Vec::new(),
        passed: Some(false),
    }
}

#[tokio::test]
async fn sqlite_store_upserts_and_removes_keys() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");
    store.migrate().await.expect("migrate twice");

    assert_eq!(store.get("k").await.unwrap(), None);
    store.set("k", "1").await.unwrap();
    store.set("k", "2").await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));

    store
        .set_many(&[("a", "x".to_owned()), ("k", "3".to_owned())])
        .await
        .unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("x"));
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("3"));

    store.remove("k").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_storage_round_trips_every_bucket() {
    let storage = Storage::sqlite("sqlite:file:memdb_buckets?mode=memory&cache=shared")
        .await
        .expect("connect");

    let bank = build_bank("net");
    storage.banks.upsert_bank(&bank).await.unwrap();
    assert_eq!(
        storage.banks.get_bank(bank.id()).await.unwrap(),
        Some(bank.clone())
    );

    let attempt = build_attempt("a1");
    storage.attempts.upsert_attempt(&attempt).await.unwrap();
    let stats = UserStats::from_attempts(&[attempt.clone()]);
    storage.stats.save_stats(&stats).await.unwrap();

    let mut option_orders = BTreeMap::new();
    option_orders.insert(1, vec![2, 0, 1]);
    let mut session = ExamSession::new(
        AttemptId::new("s1"),
        &bank,
        ExamMode::Exam,
        fixed_now(),
        vec![2, 0, 1],
        option_orders,
    );
    session.answers.insert(2, vec!["beta".into()]);
    session.flagged.insert(0);
    storage.sessions.save_session(&session).await.unwrap();

    assert_eq!(
        storage.attempts.get_attempt(&attempt.id).await.unwrap(),
        Some(attempt)
    );
    assert_eq!(storage.stats.load_stats().await.unwrap(), stats);
    assert_eq!(storage.sessions.load_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn sqlite_corrupt_bucket_reads_as_empty() {
    let store = SqliteStore::connect("sqlite:file:memdb_corrupt?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");
    store.set(QUESTION_BANKS_KEY, "not json").await.unwrap();

    let storage = Storage::with_store(std::sync::Arc::new(store));
    assert!(storage.banks.list_banks().await.unwrap().is_empty());
}
