//! HTTP endpoint handlers. These are thin wrappers that forward to the quiz app.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingCredential => StatusCode::UNAUTHORIZED,
            AppError::InvalidInput(_) | AppError::Session(_) => StatusCode::BAD_REQUEST,
            AppError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Busy { .. } | AppError::SessionAlreadyComplete | AppError::NoMistakesToRetry => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Scoring(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorOut { error: self.to_string(), kind: self.kind() })).into_response()
    }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// -------- Credential --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_credential(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(CredentialOut { configured: state.lock().has_api_key() })
}

#[instrument(level = "info", skip(state, body), fields(key_len = body.api_key.len()))]
pub async fn http_put_credential(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApiKeyIn>,
) -> Result<Json<CredentialOut>, AppError> {
    state.transition(|app, _| app.set_api_key(&body.api_key))?;
    Ok(Json(CredentialOut { configured: true }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_credential(State(state): State<Arc<AppState>>) -> Result<Json<CredentialOut>, AppError> {
    state.transition(|app, _| app.clear_api_key())?;
    Ok(Json(CredentialOut { configured: false }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models = &state.config.models;
    Json(ModelsOut { default_model: models.default_model.clone(), available: models.available.clone() })
}

// -------- Quiz --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_quiz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot())
}

#[instrument(level = "info", skip(state, body), fields(count = body.question_count, mode = %body.mode, has_document = body.document.is_some()))]
pub async fn http_post_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateIn>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.into_input()?;
    let snapshot = state.start_generation(input)?;
    info!(target: "glassquiz", status = ?snapshot.status, "HTTP generation accepted");
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

#[instrument(level = "info", skip(state, body), fields(selected = ?body.selected_index))]
pub async fn http_post_answer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse, AppError> {
    let (outcome, snapshot) = state.transition(|app, now| app.submit_answer(selection(body.selected_index), now))?;
    info!(target: "session", correct = outcome.record.is_correct, timed_out = outcome.timed_out, "HTTP answer recorded");
    Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_retry(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let (_, snapshot) = state.transition(|app, now| app.retry_mistakes(now))?;
    Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let (_, snapshot) = state.transition(|app, _| app.new_quiz())?;
    Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_report(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let text = state.lock().report().ok_or_else(|| AppError::NotFound("quiz result".into()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

// -------- History --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.lock().history();
    Json(entries.iter().map(HistorySummaryOut::from).collect::<Vec<_>>())
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_history(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    state.transition(|app, _| app.clear_history())?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_history_load(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (_, snapshot) = state.transition(|app, now| app.load_history(id, now))?;
    info!(target: "history", id, "History entry loaded");
    Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_companion(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.lock().companion(&mut rand::thread_rng());
    Json(view)
}
