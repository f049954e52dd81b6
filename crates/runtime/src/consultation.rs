use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use sqlx::types::Uuid;

use crate::{
    Character, ConsultationSession, ConversationMessage, FortuneReading, FortuneStore,
    GenerationGateway, Speaker,
};

/// Where a consultation currently stands. Forward-only; the only way back
/// to `NoCharacter` is the explicit view reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationPhase {
    NoCharacter,
    Active,
    Ended,
}

/// Outcome of a best-effort step. `Skipped` (collaborator not configured)
/// and `FailedNonFatal` (tried, failed, workflow continues) stay
/// structurally apart from critical-path errors, which propagate as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Skipped,
    FailedNonFatal,
}

/// A consultation may not end before this many messages are recorded.
pub const MIN_TRANSCRIPT_LEN: usize = 2;

/// The one state machine in the system. Holds the transient view of the
/// current consultation; persisted rows live in the store and survive a
/// reset untouched.
pub struct Consultation {
    user_id: String,
    phase: ConsultationPhase,
    character: Option<Character>,
    session: Option<ConsultationSession>,
    transcript: Vec<ConversationMessage>,
    reading: Option<FortuneReading>,
}

impl Consultation {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            phase: ConsultationPhase::NoCharacter,
            character: None,
            session: None,
            transcript: Vec::new(),
            reading: None,
        }
    }

    pub fn phase(&self) -> ConsultationPhase {
        self.phase
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn session(&self) -> Option<&ConsultationSession> {
        self.session.as_ref()
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn reading(&self) -> Option<&FortuneReading> {
        self.reading.as_ref()
    }

    /// True once the transcript is long enough for `end` to proceed.
    pub fn ready_for_reading(&self) -> bool {
        self.phase == ConsultationPhase::Active && self.transcript.len() >= MIN_TRANSCRIPT_LEN
    }

    /// NoCharacter -> Active. Persona synthesis, the character row, the
    /// session row and the greeting message are critical; the portrait is
    /// not. On a critical failure the phase is unchanged and rows already
    /// written stay behind unreferenced.
    pub async fn begin(&mut self, gen: &GenerationGateway, store: &FortuneStore) -> Result<()> {
        if self.phase != ConsultationPhase::NoCharacter {
            bail!("a consultation is already in progress; start a new one first");
        }

        let sheet = gen.synthesize_persona().await?;
        let mut character = store.create_character(&sheet).await?;

        match Self::attach_portrait(gen, store, &mut character).await {
            StepOutcome::Succeeded => {}
            StepOutcome::Skipped => {
                tracing::debug!("[Consultation::begin] portrait storage not configured, skipping")
            }
            StepOutcome::FailedNonFatal => {
                tracing::warn!("[Consultation::begin] continuing without a portrait")
            }
        }

        let session = store.create_session(&character.id, &self.user_id).await?;
        let greeting = store
            .append_message(&session.id, &character.id, Speaker::Ai, &character.greeting)
            .await?;

        self.character = Some(character);
        self.session = Some(session);
        self.transcript = vec![greeting];
        self.reading = None;
        self.phase = ConsultationPhase::Active;
        Ok(())
    }

    /// Active self-loop. The user turn is persisted before the model is
    /// asked; if the reply fails the turn stays recorded (a visible gap in
    /// the transcript) and the caller is told to retry.
    pub async fn send_message(
        &mut self,
        gen: &GenerationGateway,
        store: &FortuneStore,
        content: &str,
    ) -> Result<ConversationMessage> {
        if self.phase != ConsultationPhase::Active {
            bail!("no active consultation to talk to");
        }
        let content = content.trim();
        if content.is_empty() {
            bail!("message is empty");
        }

        let character = self.character.clone().ok_or_else(|| active_state_error())?;
        let session = self.session.clone().ok_or_else(|| active_state_error())?;

        let user_message = store
            .append_message(&session.id, &character.id, Speaker::User, content)
            .await?;
        self.transcript.push(user_message);

        let reply = gen.continue_conversation(&character, &self.transcript).await?;
        let ai_message = store
            .append_message(&session.id, &character.id, Speaker::Ai, &reply)
            .await?;
        self.transcript.push(ai_message.clone());
        Ok(ai_message)
    }

    /// Active -> Ended. Refuses while the transcript is too short;
    /// afterwards the completion flag and the reading are both best-effort
    /// and the phase moves to `Ended` no matter how they fare.
    pub async fn end(
        &mut self,
        gen: &GenerationGateway,
        store: &FortuneStore,
    ) -> Result<Option<FortuneReading>> {
        if self.phase != ConsultationPhase::Active {
            bail!("no active consultation to end");
        }
        if self.transcript.len() < MIN_TRANSCRIPT_LEN {
            bail!("the consultation is too short to read; exchange at least one message first");
        }

        let character = self.character.clone().ok_or_else(|| active_state_error())?;
        let session = self.session.clone().ok_or_else(|| active_state_error())?;

        match self.flag_completed(store, &session.id).await {
            StepOutcome::FailedNonFatal => tracing::warn!(
                "[Consultation::end] session {} proceeds to the reading while still flagged active",
                session.id
            ),
            _ => {}
        }

        match self.conclude_reading(gen, store, &character, &session.id).await {
            StepOutcome::FailedNonFatal => tracing::warn!(
                "[Consultation::end] session {} ends without a reading",
                session.id
            ),
            _ => {}
        }

        self.phase = ConsultationPhase::Ended;
        Ok(self.reading.clone())
    }

    /// View reset back to `NoCharacter`. Persisted rows are untouched.
    pub fn reset(&mut self) {
        self.phase = ConsultationPhase::NoCharacter;
        self.character = None;
        self.session = None;
        self.transcript.clear();
        self.reading = None;
    }

    pub fn view(&self) -> ConsultationView {
        ConsultationView {
            phase: self.phase,
            character: self.character.clone(),
            session: self.session.clone(),
            transcript: self.transcript.clone(),
            reading: self.reading.clone(),
        }
    }

    /// Generate, download, host and back-fill the portrait. Skipped when no
    /// bucket is configured; any failure is logged and absorbed.
    async fn attach_portrait(
        gen: &GenerationGateway,
        store: &FortuneStore,
        character: &mut Character,
    ) -> StepOutcome {
        if !store.has_bucket() {
            return StepOutcome::Skipped;
        }

        let uploaded = async {
            let temp_url = gen.generate_portrait(character).await?;
            let bytes = gen.download_portrait(&temp_url).await?;
            let url = store.upload_portrait("png", &bytes).await?;
            store.set_portrait_url(&character.id, &url).await?;
            Ok::<String, anyhow::Error>(url)
        }
        .await;

        match uploaded {
            Ok(url) => {
                character.portrait_url = Some(url);
                StepOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!("[Consultation::attach_portrait] portrait step failed: {:#}", e);
                StepOutcome::FailedNonFatal
            }
        }
    }

    /// Best-effort completion flag; the end-of-consultation flow proceeds
    /// even when this write fails.
    async fn flag_completed(&mut self, store: &FortuneStore, session_id: &Uuid) -> StepOutcome {
        match store.complete_session(session_id).await {
            Ok(Some(updated)) => {
                self.session = Some(updated);
                StepOutcome::Succeeded
            }
            // already completed: nothing to do, nothing to report
            Ok(None) => StepOutcome::Skipped,
            Err(e) => {
                tracing::warn!("[Consultation::flag_completed] {:#}", e);
                StepOutcome::FailedNonFatal
            }
        }
    }

    /// Fetch the persisted transcript, synthesize the reading, store it.
    /// Every failure leaves the session permanently without a reading.
    async fn conclude_reading(
        &mut self,
        gen: &GenerationGateway,
        store: &FortuneStore,
        character: &Character,
        session_id: &Uuid,
    ) -> StepOutcome {
        let produced = async {
            let transcript = store.conversation_history(session_id).await?;
            let sheet = gen.synthesize_reading(character, &transcript).await?;
            store.create_reading(session_id, &character.id, &sheet).await
        }
        .await;

        match produced {
            Ok(reading) => {
                self.reading = Some(reading);
                StepOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!("[Consultation::conclude_reading] {:#}", e);
                StepOutcome::FailedNonFatal
            }
        }
    }
}

fn active_state_error() -> anyhow::Error {
    anyhow!("active consultation lost its character or session")
}

/// The full consultation state, serialized for the UI after every action.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationView {
    pub phase: ConsultationPhase,
    pub character: Option<Character>,
    pub session: Option<ConsultationSession>,
    pub transcript: Vec<ConversationMessage>,
    pub reading: Option<FortuneReading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionStatus;

    fn message(speaker: Speaker, text: &str, id: i64) -> ConversationMessage {
        ConversationMessage {
            id,
            session_id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            speaker,
            message: text.to_string(),
            created_at: id,
        }
    }

    fn active_consultation(transcript_len: usize) -> Consultation {
        let mut consultation = Consultation::new("anonymous");
        consultation.phase = ConsultationPhase::Active;
        consultation.session = Some(ConsultationSession {
            id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            user_id: "anonymous".to_string(),
            status: SessionStatus::Active,
            started_at: 0,
            ended_at: None,
        });
        consultation.transcript = (0..transcript_len)
            .map(|i| {
                let speaker = if i % 2 == 0 { Speaker::Ai } else { Speaker::User };
                message(speaker, "...", i as i64)
            })
            .collect();
        consultation
    }

    #[test]
    fn starts_with_no_character() {
        let consultation = Consultation::new("anonymous");
        assert_eq!(consultation.phase(), ConsultationPhase::NoCharacter);
        assert!(consultation.character().is_none());
        assert!(consultation.transcript().is_empty());
        assert!(consultation.reading().is_none());
    }

    #[test]
    fn short_transcript_is_not_ready_for_reading() {
        assert!(!active_consultation(0).ready_for_reading());
        assert!(!active_consultation(1).ready_for_reading());
        assert!(active_consultation(2).ready_for_reading());
        assert!(active_consultation(3).ready_for_reading());
    }

    #[test]
    fn no_character_phase_is_never_ready_for_reading() {
        let consultation = Consultation::new("anonymous");
        assert!(!consultation.ready_for_reading());
    }

    #[test]
    fn reset_clears_transient_state() {
        let mut consultation = active_consultation(3);
        consultation.reset();
        assert_eq!(consultation.phase(), ConsultationPhase::NoCharacter);
        assert!(consultation.session().is_none());
        assert!(consultation.transcript().is_empty());
        assert!(consultation.reading().is_none());
    }

    #[test]
    fn view_serializes_phase_as_snake_case() {
        let view = Consultation::new("anonymous").view();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "no_character");
        assert!(json["character"].is_null());
        assert_eq!(json["transcript"], serde_json::json!([]));
    }
}
