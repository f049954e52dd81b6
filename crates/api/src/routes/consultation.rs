use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn consultation_routes() -> Router<GlobalState> {
    Router::new()
        .route("/consultation", get(current_view))
        .route("/consultation/begin", post(begin_consultation))
        .route("/consultation/message", post(send_message))
        .route("/consultation/end", post(end_consultation))
        .route("/consultation/reset", post(reset_consultation))
}

async fn current_view(State(state): State<GlobalState>) -> Result<AppSuccess, AppError> {
    let consultation = state.consultation.lock().await;
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Consultation state fetched successfully",
        json!(consultation.view()),
    ))
}

/// Welcome a new guest: persona, portrait (best-effort), session, greeting.
async fn begin_consultation(State(state): State<GlobalState>) -> Result<AppSuccess, AppError> {
    let mut consultation = state.consultation.lock().await;
    consultation.begin(&state.gateway, &state.store).await?;
    Ok(AppSuccess::new(
        StatusCode::CREATED,
        "Consultation started successfully",
        json!(consultation.view()),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    content: String,
}

async fn send_message(
    State(state): State<GlobalState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<AppSuccess, AppError> {
    let mut consultation = state.consultation.lock().await;
    consultation
        .send_message(&state.gateway, &state.store, &request.content)
        .await?;
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Reply generated successfully",
        json!(consultation.view()),
    ))
}

async fn end_consultation(State(state): State<GlobalState>) -> Result<AppSuccess, AppError> {
    let mut consultation = state.consultation.lock().await;
    consultation.end(&state.gateway, &state.store).await?;
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Consultation ended successfully",
        json!(consultation.view()),
    ))
}

async fn reset_consultation(State(state): State<GlobalState>) -> Result<AppSuccess, AppError> {
    let mut consultation = state.consultation.lock().await;
    consultation.reset();
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Consultation reset successfully",
        json!(consultation.view()),
    ))
}
