use exam_core::model::{BankId, ExamMode};
use exam_core::time::fixed_clock;
use services::{AppServices, SessionAction};
use storage::repository::Storage;

const BANK: &str = r#"{
    "name": "Cloud Basics",
    "passingScore": 70,
    "sections": [
        {"name": "Compute", "weight": 60},
        {"name": "Storage", "weight": 40}
    ],
    "questions": [
        {"question": "Which service runs containers?", "options": ["ECS", "S3", "IAM"],
         "correct_answer": "ECS", "section": "Compute", "weight": 3},
        {"question": "Object storage?", "options": ["EBS", "S3", "EFS"],
         "correct_answer": "S3", "section": "Storage"},
        {"question": "Pick the block and file stores", "options": ["EBS", "S3", "EFS"],
         "correct_answer": "EBS, EFS", "section": "Storage"}
    ]
}"#;

#[tokio::test]
async fn upload_take_and_submit_in_practice_mode() {
    let app = AppServices::with_storage(Storage::in_memory(), fixed_clock()).with_source(None);
    let bank = app.banks().upload("cloud.json", BANK).await.unwrap();
    let sessions = app.sessions();

    let mut exam = sessions
        .start(bank.id(), ExamMode::Practice)
        .await
        .unwrap()
        .exam;

    // Practice keeps bank order and option order.
    sessions.apply(&mut exam, SessionAction::Choose(0)).await.unwrap();
    assert!(exam.current_view().unwrap().locked);
    sessions.apply(&mut exam, SessionAction::Next).await.unwrap();
    sessions.apply(&mut exam, SessionAction::Choose(0)).await.unwrap();
    sessions.apply(&mut exam, SessionAction::Next).await.unwrap();
    sessions.apply(&mut exam, SessionAction::Choose(2)).await.unwrap();
    sessions.apply(&mut exam, SessionAction::Choose(0)).await.unwrap();
    sessions.apply(&mut exam, SessionAction::CheckAnswer).await.unwrap();

    // A restart resumes exactly where the user was.
    let resumed = sessions
        .start(bank.id(), ExamMode::Practice)
        .await
        .unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.exam, exam);

    let attempt = sessions.submit(resumed.exam).await.unwrap();
    assert_eq!(attempt.correct_count, 2);
    assert_eq!(attempt.wrong_count, 1);
    assert_eq!(attempt.skipped_count, 0);
    assert_eq!(attempt.total_points, 5.0);
    assert_eq!(attempt.earned_points, 4.0);
    assert_eq!(attempt.score, 80);
    assert_eq!(attempt.passed, Some(true));

    let sections: Vec<_> = attempt
        .section_scores
        .iter()
        .map(|s| (s.section.as_str(), s.score))
        .collect();
    assert_eq!(sections, [("Compute", 100), ("Storage", 50)]);

    let history = app.history();
    assert_eq!(history.best_score(bank.id()).await.unwrap(), Some(80));
    assert_eq!(history.stats().await.unwrap().average_score, 80);
    assert!(sessions.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn exam_mode_attempts_count_unanswered_as_skipped() {
    let app = AppServices::with_storage(Storage::in_memory(), fixed_clock()).with_source(None);
    let bank = app.banks().upload("cloud.json", BANK).await.unwrap();
    let sessions = app.sessions();

    let exam = sessions.start(bank.id(), ExamMode::Exam).await.unwrap().exam;
    let attempt = sessions.submit(exam).await.unwrap();

    assert_eq!(attempt.skipped_count, 3);
    assert_eq!(
        attempt.correct_count + attempt.wrong_count + attempt.skipped_count,
        attempt.total_questions
    );
    assert_eq!(attempt.score, 0);
    assert_eq!(attempt.passed, Some(false));
    assert!(
        app.history()
            .attempts_for_bank(&BankId::new("missing"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn export_restores_into_fresh_storage() {
    let app = AppServices::with_storage(Storage::in_memory(), fixed_clock()).with_source(None);
    let bank = app.banks().upload("cloud.json", BANK).await.unwrap();
    let exam = app.sessions().start(bank.id(), ExamMode::Exam).await.unwrap().exam;
    app.sessions().submit(exam).await.unwrap();

    let backup = app.transfer().export_all().await.unwrap();

    let restored = AppServices::with_storage(Storage::in_memory(), fixed_clock()).with_source(None);
    restored.transfer().import_all(&backup).await.unwrap();
    assert_eq!(restored.banks().list().await.unwrap(), vec![bank]);
    assert_eq!(restored.history().attempts().await.unwrap().len(), 1);
    assert_eq!(restored.history().stats().await.unwrap().total_attempts, 1);
}
