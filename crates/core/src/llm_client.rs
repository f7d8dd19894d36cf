use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use serde::de::DeserializeOwned;
use std::pin::Pin;

/// Who authored a turn sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A provider-neutral conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent>> + Send>>;

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call and returns the full answer text.
    async fn complete(&self, system_prompt: String, turns: Vec<ChatTurn>) -> Result<String>;

    /// Makes a streaming call whose answer arrives chunk by chunk.
    async fn stream(&self, system_prompt: String, turns: Vec<ChatTurn>) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn build_messages(
        system_prompt: String,
        turns: Vec<ChatTurn>,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(turns.len() + 1);
        if !system_prompt.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
            );
        }
        for turn in turns {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, system_prompt: String, turns: Vec<ChatTurn>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::build_messages(system_prompt, turns)?)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("LLM response had no text content."))
    }

    async fn stream(&self, system_prompt: String, turns: Vec<ChatTurn>) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::build_messages(system_prompt, turns)?)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(
            |result: Result<_, OpenAIError>| async move {
                match result {
                    Ok(response) => {
                        let content = response.choices.first()?.delta.content.clone()?;
                        if content.is_empty() {
                            None
                        } else {
                            Some(Ok(LLMStreamEvent::TextChunk(content)))
                        }
                    }
                    Err(e) => Some(Err(e.into())),
                }
            },
        )))
    }
}

/// An offline `LLMClient` used for local development.
///
/// It answers by restating the last user turn, streaming the reply word by word.
pub struct EchoLLMClient;

impl EchoLLMClient {
    fn reply_for(turns: &[ChatTurn]) -> String {
        let last = turns
            .iter()
            .rev()
            .find(|t| t.role == ChatRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();
        format!("You said: {}", last.lines().last().unwrap_or_default())
    }
}

#[async_trait]
impl LLMClient for EchoLLMClient {
    async fn complete(&self, _system_prompt: String, turns: Vec<ChatTurn>) -> Result<String> {
        Ok(Self::reply_for(&turns))
    }

    async fn stream(&self, _system_prompt: String, turns: Vec<ChatTurn>) -> Result<LLMStream> {
        let reply = Self::reply_for(&turns);
        let chunks: Vec<Result<LLMStreamEvent>> = reply
            .split_inclusive(' ')
            .map(|word| Ok(LLMStreamEvent::TextChunk(word.to_string())))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Extracts and parses the JSON payload of a model answer.
///
/// Models often wrap JSON in Markdown fences or add a sentence around it, so
/// the outermost object or array is located before parsing.
pub fn parse_json_answer<T: DeserializeOwned>(answer: &str) -> Result<T> {
    let trimmed = answer.trim();
    let start = trimmed
        .find(['{', '['])
        .context("No JSON found in LLM answer")?;
    let end = trimmed
        .rfind(['}', ']'])
        .filter(|end| *end >= start)
        .context("Unterminated JSON in LLM answer")?;
    serde_json::from_str(&trimmed[start..=end]).context("Failed to parse JSON from LLM answer")
}
