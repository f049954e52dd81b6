use anyhow::{anyhow, Result};
use async_openai::types::{
    CreateChatCompletionRequestArgs, CreateImageRequestArgs, Image, ImageModel,
    ImageResponseFormat, ImageSize, ResponseFormat,
};

use sadam_clients::LlmClient;
use sadam_common::ModuleClient;

use crate::{
    prompts, Character, CharacterSheet, ConversationMessage, Prompt, ReadingSheet, Speaker,
};

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Marshals the generation calls: persona synthesis, in-character replies,
/// the closing reading, and the best-effort portrait pair. Every operation
/// is one round trip with no retry; a transport error and a malformed reply
/// surface as the same opaque failure.
#[derive(Clone)]
pub struct GenerationGateway {
    llm: LlmClient,
    http: reqwest::Client,
    chat_model: String,
    image_model: String,
}

impl GenerationGateway {
    pub fn new(llm: LlmClient) -> Self {
        let chat_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        let image_model =
            std::env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string());
        Self {
            llm,
            http: reqwest::Client::new(),
            chat_model,
            image_model,
        }
    }

    /// Invent a new consultation guest.
    pub async fn synthesize_persona(&self) -> Result<CharacterSheet> {
        tracing::debug!("[GenerationGateway::synthesize_persona] requesting a new guest");
        let messages = vec![
            Prompt::new_system(prompts::PERSONA_SYSTEM_PROMPT),
            Prompt::new_user(prompts::PERSONA_REQUEST),
        ];
        let raw = self.complete(messages, 0.8, 800, true).await?;
        CharacterSheet::from_completion(&raw)
    }

    /// In-character reply over the prior transcript. The transcript must
    /// end with the user's new utterance; any non-empty reply is accepted.
    pub async fn continue_conversation(
        &self,
        character: &Character,
        transcript: &[ConversationMessage],
    ) -> Result<String> {
        match transcript.last() {
            Some(last) if last.speaker == Speaker::User => {}
            _ => return Err(anyhow!("conversation must end with the user's utterance")),
        }

        let mut messages = vec![Prompt::new_system(&prompts::roleplay_system_prompt(character))];
        messages.extend(transcript.iter().map(Prompt::from_transcript));

        let reply = self.complete(messages, 0.7, 400, false).await?;
        if reply.trim().is_empty() {
            return Err(anyhow!("model returned an empty reply"));
        }
        Ok(reply)
    }

    /// The closing interpretation over the whole consultation.
    pub async fn synthesize_reading(
        &self,
        character: &Character,
        transcript: &[ConversationMessage],
    ) -> Result<ReadingSheet> {
        let block = transcript_block(character, transcript);
        let messages = vec![
            Prompt::new_system(prompts::READING_SYSTEM_PROMPT),
            Prompt::new_user(&prompts::reading_request(character, &block)),
        ];
        let raw = self.complete(messages, 0.7, 1200, true).await?;
        ReadingSheet::from_completion(&raw)
    }

    /// Returns the provider's temporary image URL. Best-effort only; the
    /// owning workflow step must survive a failure here.
    pub async fn generate_portrait(&self, character: &Character) -> Result<String> {
        let request = CreateImageRequestArgs::default()
            .prompt(prompts::portrait_request(character))
            .model(ImageModel::Other(self.image_model.clone()))
            .n(1)
            .response_format(ImageResponseFormat::Url)
            .size(ImageSize::S1024x1024)
            .build()?;

        let response = self.llm.get_client().images().create(request).await?;
        let image = response
            .data
            .first()
            .ok_or_else(|| anyhow!("no image in portrait response"))?;

        match image.as_ref() {
            Image::Url { url, .. } => Ok(url.clone()),
            Image::B64Json { .. } => Err(anyhow!("portrait response was not a URL")),
        }
    }

    /// Fetch the raw bytes behind a temporary portrait URL.
    pub async fn download_portrait(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn complete(
        &self,
        messages: Vec<Prompt>,
        temperature: f32,
        max_tokens: u32,
        structured: bool,
    ) -> Result<String> {
        let llm_messages = Prompt::pack(messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.chat_model)
            .messages(llm_messages)
            .temperature(temperature)
            .max_tokens(max_tokens);
        if structured {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder.build()?;

        let response = self.llm.get_client().chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("no choices from model {}", self.chat_model))?;

        choice
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("no content from model {}", self.chat_model))
    }
}

/// The speaker-labeled transcript the reading prompt embeds.
fn transcript_block(character: &Character, transcript: &[ConversationMessage]) -> String {
    transcript
        .iter()
        .map(|m| match m.speaker {
            Speaker::User => format!("상담사: {}", m.message),
            Speaker::Ai => format!("{}: {}", character.name, m.message),
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Uuid;

    fn message(speaker: Speaker, text: &str, created_at: i64) -> ConversationMessage {
        ConversationMessage {
            id: created_at,
            session_id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            speaker,
            message: text.to_string(),
            created_at,
        }
    }

    fn character() -> Character {
        Character {
            id: Uuid::new_v4(),
            name: "임수진".to_string(),
            age: 35,
            gender: "여성".to_string(),
            occupation: "프리랜서 일러스트레이터".to_string(),
            personality: "섬세하고 내성적".to_string(),
            concern: "진로 고민".to_string(),
            birth_date: "1985-07-14".to_string(),
            birth_time: "08:30".to_string(),
            speaking_style: "부드럽고 정중함".to_string(),
            greeting: "안녕하세요...".to_string(),
            portrait_url: None,
            created_at: 0,
        }
    }

    #[test]
    fn transcript_block_labels_speakers() {
        let character = character();
        let transcript = vec![
            message(Speaker::Ai, "안녕하세요...", 1),
            message(Speaker::User, "어서오세요, 어떤 일로 오셨나요?", 2),
        ];
        let block = transcript_block(&character, &transcript);
        assert_eq!(
            block,
            "임수진: 안녕하세요...\n상담사: 어서오세요, 어떤 일로 오셨나요?"
        );
    }
}
