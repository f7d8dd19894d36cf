//! API and Database Models
//!
//! This module defines the request/response bodies of the REST API, documented
//! with `utoipa`, and the row types read with `sqlx`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tutor_core::{
    listing::{Listing, ListingKind, ListingQuery},
    quiz::{QuestionView, QuizAttempt, QuizPhase, QuizResult, QuizStep},
    session::{LearningStyle, LessonOrchestrator, ViewMode},
    topic::TopicData,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Deserialize, ToSchema, Default)]
pub struct CreateSessionPayload {
    #[schema(value_type = Option<String>, example = "visual")]
    #[serde(default)]
    pub learning_style: Option<LearningStyle>,
}

/// Snapshot of a tutoring session as seen by the front-end.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, example = "learning")]
    pub view_mode: ViewMode,
    #[schema(value_type = String, example = "reading")]
    pub learning_style: LearningStyle,
    #[schema(value_type = Option<Object>)]
    pub topic_data: Option<TopicData>,
    pub current_topic: Option<String>,
    pub current_subtopic: Option<String>,
    pub completed_lessons: Vec<String>,
    pub available_topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(id: Uuid, created_at: DateTime<Utc>, session: &LessonOrchestrator) -> Self {
        let mut completed_lessons: Vec<String> =
            session.completed_lessons.iter().cloned().collect();
        completed_lessons.sort();
        Self {
            id,
            view_mode: session.view_mode,
            learning_style: session.learning_style,
            topic_data: session.topic_data.clone(),
            current_topic: session.current_topic.clone(),
            current_subtopic: session.current_subtopic.clone(),
            completed_lessons,
            available_topics: session
                .available_topics()
                .into_iter()
                .map(|t| t.name.clone())
                .collect(),
            created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeTextPayload {
    #[schema(example = "Photosynthesis converts light into chemical energy...")]
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadFilePayload {
    #[schema(example = "notes.md")]
    pub file_name: String,
    #[schema(example = "text/markdown")]
    pub mime_type: String,
    /// File content, base64 encoded.
    pub content_base64: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectTopicPayload {
    #[schema(example = "Light reactions")]
    pub name: String,
    pub subtopic: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteLessonPayload {
    #[schema(example = "Light reactions")]
    pub topic: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SetViewModePayload {
    #[schema(value_type = String, example = "concept_map")]
    pub mode: ViewMode,
}

#[derive(Deserialize, ToSchema)]
pub struct StartQuizPayload {
    #[schema(example = 5)]
    pub question_count: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerPayload {
    #[schema(example = "Thylakoid")]
    pub answer: String,
}

/// State of the session's current quiz attempt.
#[derive(Serialize, ToSchema, Debug)]
pub struct QuizView {
    pub topic: String,
    #[schema(value_type = String, example = "answering")]
    pub phase: QuizPhase,
    pub score: usize,
    pub total: usize,
    #[schema(value_type = Option<Object>)]
    pub question: Option<QuestionView>,
    #[schema(value_type = Option<Object>)]
    pub result: Option<QuizResult>,
}

impl From<&QuizAttempt> for QuizView {
    fn from(quiz: &QuizAttempt) -> Self {
        Self {
            topic: quiz.topic().to_string(),
            phase: quiz.phase(),
            score: quiz.score(),
            total: quiz.len(),
            question: quiz.current_question(),
            result: quiz.result(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct QuizNextResponse {
    #[serde(flatten)]
    pub step: QuizStep,
    /// The topic completed by a passing result, if any.
    pub completed_topic: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ListingsParams {
    /// Free-text search over title, category and description.
    pub q: Option<String>,
    pub category: Option<String>,
    /// `job` or `gig`.
    #[param(value_type = Option<String>)]
    pub kind: Option<ListingKind>,
    #[serde(default)]
    pub remote_only: bool,
    /// Maximum rows fetched before searching (default 100, max 500).
    pub limit: Option<i64>,
}

impl ListingsParams {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }

    pub fn query(&self) -> ListingQuery {
        ListingQuery {
            q: self.q.clone(),
            category: self.category.clone(),
            kind: self.kind,
            remote_only: self.remote_only,
        }
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct ListingRow {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub remote: bool,
    pub pay_min: Option<i64>,
    pub pay_max: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = anyhow::Error;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            id: row.id,
            kind: row.kind.parse().map_err(anyhow::Error::msg)?,
            title: row.title,
            description: row.description,
            category: row.category,
            location: row.location,
            remote: row.remote,
            pay_min: row.pay_min,
            pay_max: row.pay_max,
            created_at: row.created_at,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::session::ViewMode;

    #[test]
    fn test_create_session_payload_defaults() {
        let payload: CreateSessionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.learning_style.is_none());

        let payload: CreateSessionPayload =
            serde_json::from_str(r#"{"learning_style": "kinesthetic"}"#).unwrap();
        assert_eq!(payload.learning_style, Some(LearningStyle::Kinesthetic));
    }

    #[test]
    fn test_set_view_mode_payload_uses_snake_case() {
        let payload: SetViewModePayload =
            serde_json::from_str(r#"{"mode": "concept_map"}"#).unwrap();
        assert_eq!(payload.mode, ViewMode::ConceptMap);

        let invalid: Result<SetViewModePayload, _> = serde_json::from_str(r#"{"mode": "admin"}"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_session_view_lists_sorted_completions() {
        let mut session = LessonOrchestrator::default();
        session.complete_lesson("b");
        session.complete_lesson("a");
        let view = SessionView::new(Uuid::new_v4(), Utc::now(), &session);

        assert_eq!(view.completed_lessons, ["a", "b"]);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view_mode"], "upload");
        assert!(json["topic_data"].is_null());
    }

    #[test]
    fn test_listing_row_conversion() {
        let row = ListingRow {
            id: Uuid::new_v4(),
            kind: "gig".into(),
            title: "Dog Walker".into(),
            description: "Two dogs".into(),
            category: "Pet Care".into(),
            location: "Austin".into(),
            remote: false,
            pay_min: Some(15),
            pay_max: Some(25),
            created_at: Utc::now(),
        };
        let listing = Listing::try_from(row.clone()).unwrap();
        assert_eq!(listing.kind, ListingKind::Gig);

        let bad = ListingRow {
            kind: "contract".into(),
            ..row
        };
        assert!(Listing::try_from(bad).is_err());
    }

    #[test]
    fn test_listings_params_limit_is_clamped() {
        let params = ListingsParams::default();
        assert_eq!(params.effective_limit(), 100);
        let params = ListingsParams {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(params.effective_limit(), 500);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Session not found"}"#);
    }
}
