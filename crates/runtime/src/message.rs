use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

/// Who authored a transcript turn. `Ai` is the roleplayed guest, `User`
/// the human playing the fortune teller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "speaker", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

/// One turn of dialogue. Append-only; `id` is a store-generated sequence so
/// equal-second timestamps still read back in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationMessage {
    pub id: i64,
    pub session_id: Uuid,
    pub character_id: Uuid,
    pub speaker: Speaker,
    pub message: String,
    pub created_at: i64,
}
