//! Language-model client abstraction.
//!
//! The remote call is an opaque collaborator: prompt in, text out, may fail.
//! [`GenAiChatModel`] is the production implementation on top of the genai
//! client; tests use [`MockChatModel`].

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, MessageContent};
use std::fmt::Debug;

use crate::{
    config::ModelSettings,
    conversation::{ChatTurn, TurnRole},
    error::{CoreError, Result},
};

/// Trait seam for the remote chat API.
#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    /// Send the conversation so far plus the current prompt; returns the
    /// model's text answer.
    async fn complete(&self, history: &[ChatTurn], prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// A chat client backed by the genai library.
///
/// API keys are read from the environment by genai itself (GEMINI_API_KEY,
/// ANTHROPIC_API_KEY, OPENAI_API_KEY, ...).
#[derive(Debug, Clone)]
pub struct GenAiChatModel {
    client: genai::Client,
    settings: ModelSettings,
}

impl GenAiChatModel {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            client: genai::Client::default(),
            settings,
        }
    }
}

#[async_trait]
impl ChatModel for GenAiChatModel {
    async fn complete(&self, history: &[ChatTurn], prompt: &str) -> Result<String> {
        let mut request = ChatRequest::default();
        for turn in history {
            request = request.append_message(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        request = request.append_message(ChatMessage::user(prompt.to_string()));

        let mut options = ChatOptions::default();
        if let Some(temperature) = self.settings.temperature {
            options = options.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        let response = self
            .client
            .exec_chat(&self.settings.model, request, Some(&options))
            .await
            .map_err(|e| CoreError::model_call_failed(&self.settings.model, e))?;

        let text = response
            .content
            .iter()
            .filter_map(|content| match content {
                MessageContent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(CoreError::EmptyModelResponse {
                model: self.settings.model.clone(),
            });
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

/// Mock chat model for testing: replays canned responses in order.
#[derive(Debug)]
pub struct MockChatModel {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    /// Prompts the mock has been called with, for assertions.
    pub prompts: std::sync::Mutex<Vec<String>>,
}

impl MockChatModel {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _history: &[ChatTurn], prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            CoreError::model_call_failed(
                "mock",
                std::io::Error::other("mock has no more responses"),
            )
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
