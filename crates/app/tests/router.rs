use std::sync::Arc;

use app::bank_dir::BankDirectory;
use app::routes::{AppState, create_router};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const NETWORKING: &str = r#"{
  "name": "Networking",
  "questions": [
    {"question": "Port for HTTPS?", "options": ["80", "443"], "correct_answer": "443"},
    {"question": "Which are private ranges?", "options": ["10.0.0.0/8", "8.8.8.0/24", "192.168.0.0/16"],
     "correct_answer": ["10.0.0.0/8", "192.168.0.0/16"]}
  ]
}"#;

const STORAGE: &str = r#"{
  "id": "storage-101",
  "name": "Storage",
  "questions": [
    {"question": "Block or object?", "options": {"A": "block", "B": "object"}, "correct_answer": "B"}
  ]
}"#;

fn bank_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("networking.json"), NETWORKING).unwrap();
    std::fs::write(dir.path().join("storage.json"), STORAGE).unwrap();
    std::fs::write(dir.path().join("broken.json"), r#"{"name": "No questions"}"#).unwrap();
    std::fs::write(dir.path().join("manifest.json"), r#"[{"file": "networking.json"}]"#).unwrap();
    dir
}

fn router(dir: &TempDir) -> Router {
    create_router(AppState {
        banks: Arc::new(BankDirectory::new(dir.path())),
    })
}

async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn lists_valid_banks_only() {
    let dir = bank_dir();
    let (status, body) = get(router(&dir), "/api/question-banks").await;
    assert_eq!(status, StatusCode::OK);

    let banks: Vec<Value> = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = banks.iter().map(|b| b["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["networking", "storage-101"]);
    assert_eq!(banks[0]["questions"].as_array().unwrap().len(), 2);
    assert!(banks[0]["dateAdded"].is_string());
}

#[tokio::test]
async fn serves_keyed_options_in_canonical_form() {
    let dir = bank_dir();
    let (status, body) = get(router(&dir), "/api/question-banks/storage-101").await;
    assert_eq!(status, StatusCode::OK);

    let bank: Value = serde_json::from_slice(&body).unwrap();
    let question = &bank["questions"][0];
    assert_eq!(question["options"], serde_json::json!(["block", "object"]));
    assert_eq!(question["correct_answer"], "object");
}

#[tokio::test]
async fn finds_bank_by_file_stem() {
    let dir = bank_dir();
    let (status, body) = get(router(&dir), "/api/question-banks/networking").await;
    assert_eq!(status, StatusCode::OK);

    let bank: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(bank["name"], "Networking");
}

#[tokio::test]
async fn unknown_bank_is_a_json_404() {
    let dir = bank_dir();
    for uri in ["/api/question-banks/missing", "/api/question-banks/broken"] {
        let (status, body) = get(router(&dir), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], "Question bank not found");
    }
}

#[tokio::test]
async fn missing_directory_is_a_json_500() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(AppState {
        banks: Arc::new(BankDirectory::new(dir.path().join("absent"))),
    });

    let (status, body) = get(router, "/api/question-banks").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "Failed to load question banks");
}

#[tokio::test]
async fn serves_raw_files_for_static_clients() {
    let dir = bank_dir();
    let (status, body) = get(router(&dir), "/bank/manifest.json").await;
    assert_eq!(status, StatusCode::OK);
    let manifest: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(manifest[0]["file"], "networking.json");
}
