use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use serde::{Deserialize, Serialize};

use crate::{ConversationMessage, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A role-tagged message on its way to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub role: MessageRole,
    pub content: String,
    pub created_at: i64,
}

impl Prompt {
    pub fn new_system(content: &str) -> Self {
        Self {
            role: MessageRole::System,
            content: content.to_string(),
            created_at: 0,
        }
    }

    pub fn new_user(content: &str) -> Self {
        Self {
            role: MessageRole::User,
            content: content.to_string(),
            created_at: 0,
        }
    }

    /// A persisted transcript turn as a request message. The guest speaks
    /// as the assistant, the fortune teller as the user.
    pub fn from_transcript(message: &ConversationMessage) -> Self {
        Self {
            role: match message.speaker {
                Speaker::User => MessageRole::User,
                Speaker::Ai => MessageRole::Assistant,
            },
            content: message.message.clone(),
            created_at: message.created_at,
        }
    }

    pub fn validate_messages(messages: Vec<Self>) -> Result<Vec<Self>> {
        // 1. the first message must be the one system message
        let first_message = messages
            .first()
            .ok_or(anyhow!("[Prompt::validate_messages] no messages to build input"))?;
        if first_message.role != MessageRole::System {
            return Err(anyhow!("[Prompt::validate_messages] first message should be system message"));
        }
        if messages.iter().skip(1).any(|m| m.role == MessageRole::System) {
            return Err(anyhow!("[Prompt::validate_messages] only one system message is allowed"));
        }
        // 2. there must be at least one message besides the system message
        if messages.len() == 1 {
            return Err(anyhow!("[Prompt::validate_messages] need at least one non-system message"));
        }
        // 3. the last message must be a user message
        let last_message = messages
            .last()
            .ok_or(anyhow!("[Prompt::validate_messages] no last message to build input"))?;
        if last_message.role != MessageRole::User {
            return Err(anyhow!("[Prompt::validate_messages] last message should be user message"));
        }
        Ok(messages)
    }

    /// Validate, then order by `created_at` ascending. The sort is stable,
    /// so same-second turns keep their insertion order.
    pub fn validate_and_sort(messages: Vec<Self>) -> Result<Vec<Self>> {
        let mut messages = Self::validate_messages(messages)?;
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    pub fn pack(messages: Vec<Self>) -> Result<Vec<ChatCompletionRequestMessage>> {
        let messages = Self::validate_and_sort(messages)?;
        messages
            .iter()
            .map(|m| {
                let content = m.content.clone();
                Ok(match m.role {
                    MessageRole::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| anyhow!("[Prompt::pack] failed to pack message: {}", e))?,
                    ),
                    MessageRole::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| anyhow!("[Prompt::pack] failed to pack message: {}", e))?,
                    ),
                    MessageRole::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| anyhow!("[Prompt::pack] failed to pack message: {}", e))?,
                    ),
                })
            })
            .collect()
    }
}
