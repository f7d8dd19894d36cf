//! Defines the WebSocket message protocol between the browser chat panel and the API server.

use serde::{Deserialize, Serialize};
use tutor_core::chat::Message;
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A question from the learner.
    UserMessage { text: String },
    /// Stops the reply currently streaming. The text received so far is kept.
    Cancel,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the chat is bound to the session's current lesson.
    Initialized {
        session_id: Uuid,
        topic: String,
        history: Vec<Message>,
    },
    /// Signals the beginning of a streamed reply.
    ResponseStart,
    /// A chunk of a streamed reply.
    ResponseChunk { chunk: String },
    /// The committed reply, possibly empty or partial.
    ResponseEnd { message: Message },
    /// Reports a problem with the last client message, or a fatal error.
    Error { message: String },
}
