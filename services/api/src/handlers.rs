//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for tutoring
//! sessions, quizzes and listings. It uses `utoipa` doc comments to generate
//! OpenAPI documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use tutor_core::{
    TutorError,
    catalog::CatalogSection,
    listing::{Listing, search_listings},
    material::extract_text,
    quiz::{QuizAttempt, QuizStep},
    session::ViewMode,
};
use uuid::Uuid;

use crate::{
    models::{
        AnalyzeTextPayload, AnswerPayload, CompleteLessonPayload, CreateSessionPayload,
        ErrorResponse, ListingsParams, QuizNextResponse, QuizView, SelectTopicPayload,
        SessionView, SetViewModePayload, StartQuizPayload, UploadFilePayload,
    },
    state::AppState,
    store::SessionEntry,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                warn!("Upstream generation failed: {}", message);
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        let Some(tutor_err) = err.downcast_ref::<TutorError>() else {
            return Self::InternalServerError(err);
        };
        let message = tutor_err.to_string();
        if !tutor_err.is_user_error() {
            return Self::BadGateway(message);
        }
        match tutor_err {
            TutorError::TopicNotFound(_) => Self::NotFound(message),
            TutorError::TopicLocked(_)
            | TutorError::TopicChanged(_)
            | TutorError::InvalidQuizState { .. } => Self::Conflict(message),
            _ => Self::BadRequest(message),
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<SessionEntry>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))
}

async fn session_view(entry: &SessionEntry) -> SessionView {
    SessionView::new(entry.id, entry.created_at, &*entry.orchestrator.lock().await)
}

/// Create a new tutoring session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionPayload,
    responses(
        (status = 201, description = "Session created successfully", body = SessionView),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .sessions
        .create(payload.learning_style.unwrap_or_default())
        .await;
    Ok((StatusCode::CREATED, Json(session_view(&entry).await)))
}

/// Get a session by its ID.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    Ok(Json(session_view(&entry).await))
}

/// End a session, cancelling any chat reply still streaming.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Session with id '{}' not found",
            id
        )))
    }
}

/// Runs the analyzer over `text` and loads the outline into the session.
///
/// The session lock is not held across the generation call.
async fn ingest(state: &AppState, entry: &SessionEntry, text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(TutorError::EmptyMaterial.into());
    }
    let topic_data = state.material_analyzer.analyze(text).await?;

    entry
        .orchestrator
        .lock()
        .await
        .load_topic_data(text, topic_data);
    *entry.quiz.lock().await = None;
    Ok(())
}

/// Analyze pasted learning material into a topic outline.
#[utoipa::path(
    post,
    path = "/sessions/{id}/material",
    request_body = AnalyzeTextPayload,
    responses(
        (status = 200, description = "Material analyzed; the first topic is open", body = SessionView),
        (status = 400, description = "No usable text", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "The analysis output could not be parsed", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
#[instrument(skip_all, fields(session_id = %id))]
pub async fn analyze_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnalyzeTextPayload>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    ingest(&state, &entry, &payload.text).await?;
    Ok(Json(session_view(&entry).await))
}

/// Upload a text file and analyze its contents.
#[utoipa::path(
    post,
    path = "/sessions/{id}/material/file",
    request_body = UploadFilePayload,
    responses(
        (status = 200, description = "File analyzed; the first topic is open", body = SessionView),
        (status = 400, description = "Unsupported, corrupt or empty file", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "The analysis output could not be parsed", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
#[instrument(skip_all, fields(session_id = %id))]
pub async fn upload_material_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UploadFilePayload>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    info!(file_name = %payload.file_name, mime_type = %payload.mime_type, "Material file received");
    let bytes = STANDARD
        .decode(payload.content_base64.trim())
        .map_err(|e| TutorError::CorruptFile(e.to_string()))?;
    let text = extract_text(&payload.file_name, &payload.mime_type, &bytes)?;
    ingest(&state, &entry, &text).await?;
    Ok(Json(session_view(&entry).await))
}

/// Open a topic in the learning view.
///
/// Locked topics can be opened unless `ENFORCE_TOPIC_UNLOCK` is set.
#[utoipa::path(
    post,
    path = "/sessions/{id}/topic",
    request_body = SelectTopicPayload,
    responses(
        (status = 200, description = "Topic selected", body = SessionView),
        (status = 404, description = "Session or topic not found", body = ErrorResponse),
        (status = 409, description = "Topic is locked", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn select_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectTopicPayload>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    {
        let mut session = entry.orchestrator.lock().await;
        if state.config.enforce_topic_unlock {
            session.select_unlocked_topic(&payload.name, payload.subtopic.as_deref())?;
        } else {
            session.select_topic(&payload.name, payload.subtopic.as_deref());
        }
    }
    *entry.quiz.lock().await = None;
    Ok(Json(session_view(&entry).await))
}

/// Mark a lesson as completed.
#[utoipa::path(
    post,
    path = "/sessions/{id}/lessons/complete",
    request_body = CompleteLessonPayload,
    responses(
        (status = 200, description = "Lesson marked as completed", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteLessonPayload>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    entry
        .orchestrator
        .lock()
        .await
        .complete_lesson(&payload.topic);
    Ok(Json(session_view(&entry).await))
}

/// Switch the session's active view.
#[utoipa::path(
    patch,
    path = "/sessions/{id}/view",
    request_body = SetViewModePayload,
    responses(
        (status = 200, description = "View switched", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn set_view_mode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetViewModePayload>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = find_session(&state, id).await?;
    entry.orchestrator.lock().await.set_view_mode(payload.mode);
    Ok(Json(session_view(&entry).await))
}

/// Completion figures and per-topic status, in outline order.
#[utoipa::path(
    get,
    path = "/sessions/{id}/progress",
    responses(
        (status = 200, description = "Progress report"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = find_session(&state, id).await?;
    let report = entry.orchestrator.lock().await.progress_report();
    Ok(Json(report))
}

/// The concept graph produced by analysis.
#[utoipa::path(
    get,
    path = "/sessions/{id}/concept-map",
    responses(
        (status = 200, description = "Concept map nodes and edges"),
        (status = 400, description = "No material analyzed yet", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn get_concept_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = find_session(&state, id).await?;
    let session = entry.orchestrator.lock().await;
    let data = session.topic_data.as_ref().ok_or(TutorError::NoTopicData)?;
    Ok(Json(data.concept_map.clone()))
}

/// Summary of the current topic and what comes next.
#[utoipa::path(
    get,
    path = "/sessions/{id}/recap",
    responses(
        (status = 200, description = "Recap of the current topic"),
        (status = 400, description = "No topic selected", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn get_recap(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = find_session(&state, id).await?;
    let recap = entry.orchestrator.lock().await.recap()?;
    Ok(Json(recap))
}

/// Start a quiz on the current topic.
///
/// An out-of-range count is rejected before any questions are requested.
#[utoipa::path(
    post,
    path = "/sessions/{id}/quiz",
    request_body = StartQuizPayload,
    responses(
        (status = 200, description = "Quiz ready, or `no_questions` if none could be generated", body = QuizView),
        (status = 400, description = "Invalid question count or no topic selected", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "The topic changed while questions were generated", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
#[instrument(skip_all, fields(session_id = %id))]
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartQuizPayload>,
) -> Result<Json<QuizView>, ApiError> {
    let entry = find_session(&state, id).await?;
    let context = entry.orchestrator.lock().await.lesson_context()?;

    let mut attempt = QuizAttempt::new(context.topic.clone());
    attempt
        .start(&*state.quiz_service, &context, payload.question_count)
        .await?;

    // Generation runs unlocked; the topic may have changed in the meantime.
    let mut orchestrator = entry.orchestrator.lock().await;
    if orchestrator.current_topic.as_deref() != Some(context.topic.as_str()) {
        warn!(topic = %context.topic, "Discarding quiz for a topic that is no longer open");
        return Err(TutorError::TopicChanged(context.topic).into());
    }
    orchestrator.set_view_mode(ViewMode::Quiz);
    let view = QuizView::from(&attempt);
    *entry.quiz.lock().await = Some(attempt);
    Ok(Json(view))
}

/// The session's current quiz attempt.
#[utoipa::path(
    get,
    path = "/sessions/{id}/quiz",
    responses(
        (status = 200, description = "Current quiz state", body = QuizView),
        (status = 404, description = "Session or quiz not found", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let entry = find_session(&state, id).await?;
    let quiz = entry.quiz.lock().await;
    let attempt = quiz
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No quiz has been started".to_string()))?;
    Ok(Json(QuizView::from(attempt)))
}

/// Submit an answer to the current question.
#[utoipa::path(
    post,
    path = "/sessions/{id}/quiz/answer",
    request_body = AnswerPayload,
    responses(
        (status = 200, description = "Correctness and feedback for the answer"),
        (status = 404, description = "Session or quiz not found", body = ErrorResponse),
        (status = 409, description = "Quiz is not awaiting an answer", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn answer_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = find_session(&state, id).await?;
    let mut quiz = entry.quiz.lock().await;
    let attempt = quiz
        .as_mut()
        .ok_or_else(|| ApiError::NotFound("No quiz has been started".to_string()))?;
    let feedback = attempt
        .answer(&*state.quiz_service, &payload.answer)
        .await?;
    Ok(Json(feedback))
}

/// Advance to the next question, or finish the quiz.
///
/// A passing result marks the quiz topic as completed.
#[utoipa::path(
    post,
    path = "/sessions/{id}/quiz/next",
    responses(
        (status = 200, description = "The next question, or the final result"),
        (status = 404, description = "Session or quiz not found", body = ErrorResponse),
        (status = 409, description = "Feedback has not been shown yet", body = ErrorResponse)
    ),
    params(("id" = Uuid, Path, description = "Session ID"))
)]
pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizNextResponse>, ApiError> {
    let entry = find_session(&state, id).await?;
    let (topic, step) = {
        let mut quiz = entry.quiz.lock().await;
        let attempt = quiz
            .as_mut()
            .ok_or_else(|| ApiError::NotFound("No quiz has been started".to_string()))?;
        (attempt.topic().to_string(), attempt.next()?)
    };

    let completed_topic = match &step {
        QuizStep::Complete { result } => entry
            .orchestrator
            .lock()
            .await
            .record_quiz_result(&topic, result),
        QuizStep::Question { .. } => None,
    };
    if let Some(topic) = &completed_topic {
        info!(session_id = %id, topic = %topic, "Quiz passed; lesson completed");
    }
    Ok(Json(QuizNextResponse {
        step,
        completed_topic,
    }))
}

/// Search job and gig listings.
#[utoipa::path(
    get,
    path = "/listings",
    params(ListingsParams),
    responses(
        (status = 200, description = "Matching listings, best match first"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingsParams>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = state.db.list_listings(&params).await?;
    let hits = search_listings(&listings, &params.query())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(hits))
}

/// The static catalog of marketplace sections.
#[utoipa::path(
    get,
    path = "/catalog",
    responses((status = 200, description = "Catalog sections and their items"))
)]
pub async fn get_catalog() -> Json<[CatalogSection; 4]> {
    Json(CatalogSection::ALL)
}

/// One catalog section, looked up by its slug.
#[utoipa::path(
    get,
    path = "/catalog/{slug}",
    responses(
        (status = 200, description = "The section and its items"),
        (status = 404, description = "No section with that slug", body = ErrorResponse)
    ),
    params(("slug" = String, Path, description = "Section slug, e.g. `gigs`"))
)]
pub async fn get_catalog_section(
    Path(slug): Path<String>,
) -> Result<Json<CatalogSection>, ApiError> {
    CatalogSection::from_slug(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Catalog section '{}' not found", slug)))
}
