use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

/// Moves forward only: active -> completed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One consultation instance, always tied to exactly one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConsultationSession {
    pub id: Uuid,
    pub character_id: Uuid,
    pub user_id: String,
    pub status: SessionStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

/// One row of the history listing: the session joined with the character
/// fields the sidebar shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionOverview {
    pub id: Uuid,
    pub character_id: Uuid,
    pub user_id: String,
    pub status: SessionStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,

    pub character_name: String,
    pub character_age: i32,
    pub character_occupation: String,
}
