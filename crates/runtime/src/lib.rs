mod character;
mod consultation;
mod generation;
mod message;
mod prompt;
mod prompts;
mod reading;
mod session;
mod store;

pub use character::{Character, CharacterSheet};
pub use consultation::{
    Consultation, ConsultationPhase, ConsultationView, StepOutcome, MIN_TRANSCRIPT_LEN,
};
pub use generation::GenerationGateway;
pub use message::{ConversationMessage, Speaker};
pub use prompt::{MessageRole, Prompt};
pub use reading::{FortuneReading, ReadingSheet};
pub use session::{ConsultationSession, SessionOverview, SessionStatus};
pub use store::{FortuneStore, SessionDetail};

/// Models asked for bare JSON still wrap it in markdown fences often enough
/// that both forms have to parse.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
