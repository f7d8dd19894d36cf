//! Core logic of the lesson tutor: outline analysis, the lesson orchestrator,
//! chat transcripts, quizzes and listing search. Nothing here performs I/O
//! besides the calls made through `LLMClient`.

pub mod catalog;
pub mod chat;
pub mod error;
pub mod listing;
pub mod llm_client;
pub mod material;
pub mod prompts;
pub mod quiz;
pub mod session;
pub mod topic;

pub use error::TutorError;
