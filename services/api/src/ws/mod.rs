//! WebSocket Chat
//!
//! The chat panel talks to the server over a WebSocket bound to one tutoring
//! session:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the connection lifecycle and streams replies to the client.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
