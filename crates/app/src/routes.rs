use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use exam_core::model::QuestionBank;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::bank_dir::BankDirectory;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub banks: Arc<BankDirectory>,
}

/// Assembles the HTTP router.
///
/// * `GET /api/question-banks` lists every valid bank in the directory.
/// * `GET /api/question-banks/{id}` returns one bank.
/// * `/bank/*` serves the raw files, manifest included, for static clients.
pub fn create_router(state: AppState) -> Router {
    let files = ServeDir::new(state.banks.root());

    Router::new()
        .route("/api/question-banks", get(list_banks))
        .route("/api/question-banks/{id}", get(get_bank))
        .nest_service("/bank", files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_banks(State(state): State<AppState>) -> Result<Json<Vec<QuestionBank>>, AppError> {
    let banks = state.banks.load_all().await?;
    Ok(Json(banks.into_iter().map(|f| f.bank).collect()))
}

async fn get_bank(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionBank>, AppError> {
    state
        .banks
        .find(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Question bank not found".into()))
}
