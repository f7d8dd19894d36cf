//! Chat transcript for a lesson.
//!
//! A transcript lives as long as the chat panel that owns it. Messages are only
//! ever appended, and each reply is streamed into a buffer before it replaces
//! the placeholder bubble.

use crate::{
    llm_client::{ChatTurn, LLMClient, LLMStream, LLMStreamEvent},
    material::truncate_material,
    session::LessonContext,
};
use anyhow::Result;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Greeting,
    /// An assistant bubble whose reply is still streaming.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>, kind: Option<MessageKind>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            kind,
        }
    }
}

/// Text chunks of one reply, ending early once `cancel` fires.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub fn chunk_stream(inner: LLMStream, cancel: CancellationToken) -> ChunkStream {
    Box::pin(
        inner
            .map(|event| event.map(|LLMStreamEvent::TextChunk(chunk)| chunk))
            .take_until(cancel.cancelled_owned()),
    )
}

pub struct ChatTranscript {
    system_prompt: String,
    material: Option<String>,
    messages: Vec<Message>,
    streamed: String,
}

impl ChatTranscript {
    /// Starts a transcript with a greeting for the current lesson.
    pub fn new(system_prompt: String, context: &LessonContext, material: Option<&str>) -> Self {
        let greeting = match &context.subtopic {
            Some(sub) => format!(
                "Hi! Let's dig into {} in {}. Ask me anything, or tell me what you already know and we'll build from there.",
                sub, context.topic
            ),
            None => format!(
                "Hi! Let's explore {}. Ask me anything, or tell me what you already know and we'll build from there.",
                context.topic
            ),
        };
        Self {
            system_prompt,
            material: material.map(|m| truncate_material(m).to_string()),
            messages: vec![Message::new(
                MessageRole::Assistant,
                greeting,
                Some(MessageKind::Greeting),
            )],
            streamed: String::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The turns sent to the model for the next reply.
    ///
    /// The material is spliced into the first user turn so the model always sees
    /// it, without it ever showing up as a bubble.
    pub fn request_turns(&self) -> Vec<ChatTurn> {
        let mut spliced = false;
        self.messages
            .iter()
            .filter(|m| m.kind != Some(MessageKind::Pending))
            .map(|m| match m.role {
                MessageRole::Assistant => ChatTurn::assistant(m.content.clone()),
                MessageRole::User => {
                    let content = match (&self.material, spliced) {
                        (Some(material), false) => {
                            format!("Learning material:\n{}\n\n{}", material, m.content)
                        }
                        _ => m.content.clone(),
                    };
                    spliced = true;
                    ChatTurn::user(content)
                }
            })
            .collect()
    }

    /// Sends a user message and waits for the full reply.
    ///
    /// Every chunk is also forwarded to `chunk_tx` when given. Upstream failures
    /// and cancellation are not retried: whatever text arrived, possibly none,
    /// becomes the reply.
    pub async fn send(
        &mut self,
        client: &dyn LLMClient,
        text: &str,
        cancel: &CancellationToken,
        chunk_tx: Option<mpsc::Sender<String>>,
    ) -> &Message {
        self.messages.push(Message::new(MessageRole::User, text, None));
        let turns = self.request_turns();
        self.messages.push(Message::new(
            MessageRole::Assistant,
            String::new(),
            Some(MessageKind::Pending),
        ));
        self.streamed.clear();
        debug!(turns = turns.len(), "Requesting reply");

        match client.stream(self.system_prompt.clone(), turns).await {
            Ok(stream) => {
                let mut chunks = chunk_stream(stream, cancel.clone());
                while let Some(item) = chunks.next().await {
                    match item {
                        Ok(chunk) => {
                            self.streamed.push_str(&chunk);
                            if let Some(tx) = &chunk_tx {
                                if tx.send(chunk).await.is_err() {
                                    debug!("Chunk receiver dropped; continuing without forwarding.");
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = ?e, "Reply stream failed; keeping partial text.");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(error = ?e, "Failed to start reply stream."),
        }
        if cancel.is_cancelled() {
            info!(received = self.streamed.len(), "Reply cancelled.");
        }
        self.commit()
    }

    fn commit(&mut self) -> &Message {
        let idx = self.messages.len() - 1;
        let placeholder = &mut self.messages[idx];
        placeholder.content = std::mem::take(&mut self.streamed);
        placeholder.kind = None;
        &self.messages[idx]
    }
}
