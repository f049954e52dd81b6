use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

/// Read-only browsing of past consultations. Never touches the live state
/// machine.
pub fn history_routes() -> Router<GlobalState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/session/{session_id}", get(get_session_detail))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListSessionsQuery {
    limit: Option<i64>,
    user_id: Option<String>,
}

async fn list_sessions(
    State(state): State<GlobalState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<AppSuccess, AppError> {
    let limit = query.limit.unwrap_or(10);
    let user_id = match query.user_id {
        Some(user_id) => user_id,
        None => state.consultation.lock().await.user_id().to_string(),
    };

    let sessions = state.store.list_sessions(&user_id, limit).await?;
    Ok(AppSuccess::new(
        StatusCode::OK,
        "Sessions fetched successfully",
        json!(sessions),
    ))
}

async fn get_session_detail(
    State(state): State<GlobalState>,
    Path(session_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let detail = state
        .store
        .session_detail(&session_id)
        .await?
        .ok_or(AppError::new(StatusCode::NOT_FOUND, anyhow!("Session not found")))?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Session detail fetched successfully",
        json!(detail),
    ))
}
