//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool, the session store and the
//! generation services.

use crate::{config::Config, db::Db, store::SessionStore};
use std::sync::Arc;
use tutor_core::{
    llm_client::LLMClient, material::MaterialAnalyzer, prompts::Prompts, quiz::QuizService,
};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub sessions: Arc<SessionStore>,
    pub llm_client: Arc<dyn LLMClient>,
    pub material_analyzer: Arc<dyn MaterialAnalyzer>,
    pub quiz_service: Arc<dyn QuizService>,
    pub prompts: Arc<Prompts>,
    pub config: Arc<Config>,
}
