use anyhow::{anyhow, Result};
use serde::Serialize;
use sqlx::types::Uuid;
use sqlx::PgPool;

use sadam_clients::{PostgresClient, R2Client};
use sadam_common::{get_current_timestamp, ModuleClient};

use crate::{
    Character, CharacterSheet, ConsultationSession, ConversationMessage, FortuneReading,
    ReadingSheet, SessionOverview, SessionStatus, Speaker,
};

/// Idempotent bootstrap. The enum guards swallow `duplicate_object` so a
/// second startup is a no-op.
const SCHEMA_SQL: &str = r#"
DO $$ BEGIN
    CREATE TYPE session_status AS ENUM ('active', 'completed');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE speaker AS ENUM ('user', 'ai');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS characters (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL,
    age INT NOT NULL,
    gender TEXT NOT NULL,
    occupation TEXT NOT NULL,
    personality TEXT NOT NULL,
    concern TEXT NOT NULL,
    birth_date TEXT NOT NULL,
    birth_time TEXT NOT NULL,
    speaking_style TEXT NOT NULL,
    greeting TEXT NOT NULL,
    portrait_url TEXT,
    created_at BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    character_id UUID NOT NULL REFERENCES characters(id),
    user_id TEXT NOT NULL,
    status session_status NOT NULL DEFAULT 'active',
    started_at BIGINT NOT NULL,
    ended_at BIGINT
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_started
    ON sessions (user_id, started_at DESC);

CREATE TABLE IF NOT EXISTS conversations (
    id BIGSERIAL PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES sessions(id),
    character_id UUID NOT NULL REFERENCES characters(id),
    speaker speaker NOT NULL,
    message TEXT NOT NULL,
    created_at BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_session
    ON conversations (session_id, created_at, id);

CREATE TABLE IF NOT EXISTS fortune_results (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    session_id UUID NOT NULL UNIQUE REFERENCES sessions(id),
    character_id UUID NOT NULL REFERENCES characters(id),
    fortune_analysis TEXT NOT NULL,
    personality_analysis TEXT NOT NULL,
    advice TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at BIGINT NOT NULL
);
"#;

/// Everything history browsing needs for one past session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub session: ConsultationSession,
    pub character: Character,
    pub transcript: Vec<ConversationMessage>,
    pub reading: Option<FortuneReading>,
}

/// CRUD over the four tables plus the portrait bucket. No retries, no
/// cross-table transactions: a failure between two inserts leaves the first
/// row behind, and callers surface the error instead of cleaning up.
#[derive(Clone)]
pub struct FortuneStore {
    db: PostgresClient,
    bucket: Option<R2Client>,
}

impl FortuneStore {
    pub fn new(db: PostgresClient, bucket: Option<R2Client>) -> Self {
        Self { db, bucket }
    }

    fn pool(&self) -> &PgPool {
        self.db.get_client()
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(self.pool()).await?;
        Ok(())
    }

    pub async fn create_character(&self, sheet: &CharacterSheet) -> Result<Character> {
        let character = sqlx::query_as::<_, Character>(
            r#"
            INSERT INTO characters
                (name, age, gender, occupation, personality, concern,
                 birth_date, birth_time, speaking_style, greeting, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&sheet.name)
        .bind(sheet.age)
        .bind(&sheet.gender)
        .bind(&sheet.occupation)
        .bind(&sheet.personality)
        .bind(&sheet.concern)
        .bind(&sheet.birth_date)
        .bind(&sheet.birth_time)
        .bind(&sheet.speaking_style)
        .bind(&sheet.greeting)
        .bind(get_current_timestamp())
        .fetch_one(self.pool())
        .await?;

        tracing::info!("[FortuneStore::create_character] created character {}", character.id);
        Ok(character)
    }

    /// The one permitted character mutation: the portrait URL back-fill.
    pub async fn set_portrait_url(&self, character_id: &Uuid, url: &str) -> Result<()> {
        sqlx::query("UPDATE characters SET portrait_url = $2 WHERE id = $1")
            .bind(character_id)
            .bind(url)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn get_character(&self, id: &Uuid) -> Result<Option<Character>> {
        let character = sqlx::query_as::<_, Character>("SELECT * FROM characters WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(character)
    }

    pub async fn create_session(
        &self,
        character_id: &Uuid,
        user_id: &str,
    ) -> Result<ConsultationSession> {
        let session = sqlx::query_as::<_, ConsultationSession>(
            r#"
            INSERT INTO sessions (character_id, user_id, status, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(character_id)
        .bind(user_id)
        .bind(SessionStatus::Active)
        .bind(get_current_timestamp())
        .fetch_one(self.pool())
        .await?;

        tracing::info!("[FortuneStore::create_session] created session {}", session.id);
        Ok(session)
    }

    pub async fn get_session(&self, id: &Uuid) -> Result<Option<ConsultationSession>> {
        let session =
            sqlx::query_as::<_, ConsultationSession>("SELECT * FROM sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(session)
    }

    /// Flag a session completed. The `status = 'active'` guard keeps the
    /// transition forward-only; completing twice returns `None`.
    pub async fn complete_session(&self, id: &Uuid) -> Result<Option<ConsultationSession>> {
        let session = sqlx::query_as::<_, ConsultationSession>(
            r#"
            UPDATE sessions
            SET status = 'completed', ended_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(get_current_timestamp())
        .fetch_optional(self.pool())
        .await?;
        Ok(session)
    }

    pub async fn append_message(
        &self,
        session_id: &Uuid,
        character_id: &Uuid,
        speaker: Speaker,
        message: &str,
    ) -> Result<ConversationMessage> {
        let message = sqlx::query_as::<_, ConversationMessage>(
            r#"
            INSERT INTO conversations (session_id, character_id, speaker, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(character_id)
        .bind(speaker)
        .bind(message)
        .bind(get_current_timestamp())
        .fetch_one(self.pool())
        .await?;
        Ok(message)
    }

    /// The full transcript, oldest first. The sequence id breaks
    /// same-second ties so re-reads are identical.
    pub async fn conversation_history(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<ConversationMessage>> {
        let messages = sqlx::query_as::<_, ConversationMessage>(
            "SELECT * FROM conversations WHERE session_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }

    /// Most recent sessions first, scoped to one user.
    pub async fn list_sessions(&self, user_id: &str, limit: i64) -> Result<Vec<SessionOverview>> {
        let sessions = sqlx::query_as::<_, SessionOverview>(
            r#"
            SELECT
                s.id, s.character_id, s.user_id, s.status, s.started_at, s.ended_at,
                c.name AS character_name,
                c.age AS character_age,
                c.occupation AS character_occupation
            FROM sessions s
            JOIN characters c ON c.id = s.character_id
            WHERE s.user_id = $1
            ORDER BY s.started_at DESC, s.id
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(sessions)
    }

    pub async fn create_reading(
        &self,
        session_id: &Uuid,
        character_id: &Uuid,
        sheet: &ReadingSheet,
    ) -> Result<FortuneReading> {
        let reading = sqlx::query_as::<_, FortuneReading>(
            r#"
            INSERT INTO fortune_results
                (session_id, character_id, fortune_analysis, personality_analysis,
                 advice, summary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(character_id)
        .bind(&sheet.fortune_analysis)
        .bind(&sheet.personality_analysis)
        .bind(&sheet.advice)
        .bind(&sheet.summary)
        .bind(get_current_timestamp())
        .fetch_one(self.pool())
        .await?;

        tracing::info!("[FortuneStore::create_reading] stored reading for session {}", session_id);
        Ok(reading)
    }

    pub async fn reading_for_session(&self, session_id: &Uuid) -> Result<Option<FortuneReading>> {
        let reading = sqlx::query_as::<_, FortuneReading>(
            "SELECT * FROM fortune_results WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(reading)
    }

    /// Character + transcript + reading for history browsing; never
    /// mutates anything.
    pub async fn session_detail(&self, session_id: &Uuid) -> Result<Option<SessionDetail>> {
        let Some(session) = self.get_session(session_id).await? else {
            return Ok(None);
        };
        let character = self
            .get_character(&session.character_id)
            .await?
            .ok_or_else(|| anyhow!("session {} references a missing character", session_id))?;
        let transcript = self.conversation_history(session_id).await?;
        let reading = self.reading_for_session(session_id).await?;

        Ok(Some(SessionDetail {
            session,
            character,
            transcript,
            reading,
        }))
    }

    pub fn has_bucket(&self) -> bool {
        self.bucket.is_some()
    }

    /// Host portrait bytes in the bucket and hand back the public URL.
    pub async fn upload_portrait(&self, file_extension: &str, data: &[u8]) -> Result<String> {
        let bucket = self
            .bucket
            .as_ref()
            .ok_or_else(|| anyhow!("object storage is not configured"))?;
        let key = R2Client::portrait_key(file_extension);
        bucket.upload_bytes(&key, file_extension, data).await
    }
}
