//! Manages the WebSocket connection lifecycle for a chat panel.
//!
//! Each connection owns its transcript. Replies are streamed chunk by chunk
//! and run on a child of the session's cancellation token, so closing the
//! socket, sending `cancel` or removing the session all stop the request.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{handlers::ApiError, state::AppState, store::SessionEntry};
use anyhow::{Context, Result};
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use tutor_core::{chat::ChatTranscript, llm_client::LLMClient};
use uuid::Uuid;

const CHUNK_BUFFER: usize = 64;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
///
/// Unknown sessions are rejected before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let entry = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, entry)))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "chat_session", skip_all, fields(session_id = %entry.id, connection))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, entry: Arc<SessionEntry>) {
    let connection: u32 = rand::random();
    tracing::Span::current().record("connection", connection);
    info!("New chat connection.");

    let (mut socket_tx, mut socket_rx) = socket.split();

    let (topic, transcript) = match open_transcript(&state, &entry).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "Chat could not be initialized.");
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            let _ = socket_tx.close().await;
            return;
        }
    };

    let initialized = ServerMessage::Initialized {
        session_id: entry.id,
        topic,
        history: transcript.messages().to_vec(),
    };
    if send_msg(&mut socket_tx, initialized).await.is_err() {
        error!("Failed to send Initialized message to client.");
        return;
    }

    if let Err(e) = run_chat(&state, &entry, transcript, &mut socket_tx, &mut socket_rx).await {
        error!(error = ?e, "Chat session terminated with error.");
    }
    info!("Chat connection closed.");
}

/// Builds a transcript bound to the session's current lesson.
async fn open_transcript(
    state: &AppState,
    entry: &SessionEntry,
) -> Result<(String, ChatTranscript)> {
    let session = entry.orchestrator.lock().await;
    let context = session.lesson_context()?;
    let system_prompt = state
        .prompts
        .render("tutor_system", &[("context", context.describe().as_str())])
        .context("Failed to render the tutor system prompt")?;
    let transcript = ChatTranscript::new(system_prompt, &context, session.material());
    Ok((context.topic, transcript))
}

/// The main event loop for an open chat.
async fn run_chat(
    state: &AppState,
    entry: &SessionEntry,
    mut transcript: ChatTranscript,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = entry.cancel.cancelled() => {
                info!("Session removed; closing chat.");
                let _ = socket_tx.close().await;
                break;
            }
            incoming = socket_rx.next() => {
                let Some(incoming) = incoming else { break };
                match incoming? {
                    Message::Text(raw) => match serde_json::from_str::<ClientMessage>(raw.as_str()) {
                        Ok(ClientMessage::UserMessage { text }) => {
                            let keep_open = stream_reply(
                                &*state.llm_client,
                                entry,
                                &mut transcript,
                                &text,
                                socket_tx,
                                socket_rx,
                            )
                            .await?;
                            if !keep_open {
                                break;
                            }
                        }
                        Ok(ClientMessage::Cancel) => debug!("Cancel received with no reply in flight."),
                        Err(e) => {
                            send_msg(socket_tx, ServerMessage::Error { message: format!("Invalid message: {}", e) }).await?;
                        }
                    },
                    Message::Close(_) => {
                        info!("Client sent close frame.");
                        break;
                    }
                    Message::Binary(_) => warn!("Ignoring binary message."),
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    }
    Ok(())
}

/// Streams one reply to the client while still listening for `cancel`.
///
/// Returns `false` if the client went away during the reply.
async fn stream_reply(
    llm_client: &dyn LLMClient,
    entry: &SessionEntry,
    transcript: &mut ChatTranscript,
    text: &str,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<bool> {
    let cancel = entry.cancel.child_token();
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    send_msg(socket_tx, ServerMessage::ResponseStart).await?;

    let mut client_open = true;
    let reply = transcript.send(llm_client, text, &cancel, Some(chunk_tx));
    tokio::pin!(reply);

    let message = loop {
        tokio::select! {
            message = &mut reply => break message.clone(),
            Some(chunk) = chunk_rx.recv() => {
                if client_open {
                    send_msg(socket_tx, ServerMessage::ResponseChunk { chunk }).await?;
                }
            }
            incoming = socket_rx.next(), if client_open => match incoming {
                Some(Ok(Message::Text(raw))) => match serde_json::from_str::<ClientMessage>(raw.as_str()) {
                    Ok(ClientMessage::Cancel) => {
                        info!("Client cancelled the reply.");
                        cancel.cancel();
                    }
                    Ok(ClientMessage::UserMessage { .. }) => {
                        send_msg(socket_tx, ServerMessage::Error { message: "A reply is already in progress".to_string() }).await?;
                    }
                    Err(e) => {
                        send_msg(socket_tx, ServerMessage::Error { message: format!("Invalid message: {}", e) }).await?;
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    info!("Client left during a reply; cancelling it.");
                    client_open = false;
                    cancel.cancel();
                }
                Some(Ok(_)) => {}
            }
        }
    };

    if !client_open {
        return Ok(false);
    }
    while let Ok(chunk) = chunk_rx.try_recv() {
        send_msg(socket_tx, ServerMessage::ResponseChunk { chunk }).await?;
    }
    send_msg(socket_tx, ServerMessage::ResponseEnd { message }).await?;
    Ok(true)
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
