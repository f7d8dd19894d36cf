//! Typed failures raised by the tutoring core.
//!
//! Service layers carry these inside `anyhow::Error` and downcast them when a
//! caller needs to tell a user mistake apart from an upstream failure.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TutorError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("The file could not be read as text: {0}")]
    CorruptFile(String),

    #[error("No text found in the provided material")]
    EmptyMaterial,

    #[error("Please enter a number between 1 and 20")]
    InvalidQuestionCount(i64),

    #[error("Topic '{0}' not found")]
    TopicNotFound(String),

    #[error("Topic '{0}' is locked until the previous lesson is completed")]
    TopicLocked(String),

    #[error("No learning material has been analyzed yet")]
    NoTopicData,

    #[error("No topic is currently selected")]
    NoTopicSelected,

    #[error("The lesson moved on from '{0}' before its quiz was ready")]
    TopicChanged(String),

    #[error("Quiz action '{action}' is not allowed while the quiz is {phase}")]
    InvalidQuizState { action: &'static str, phase: String },

    #[error("Malformed generation output: {0}")]
    MalformedResponse(String),
}

impl TutorError {
    /// True for errors caused by the caller's input rather than an upstream service.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, TutorError::MalformedResponse(_))
    }
}
