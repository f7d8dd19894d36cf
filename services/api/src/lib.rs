//! Tutor API Library Crate
//!
//! This library contains all the logic for the tutor web service, including
//! the application state, the in-memory session store, database access, API
//! handlers, the chat WebSocket and routing. The binaries are thin wrappers
//! around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod store;
pub mod ws;
