//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the chat WebSocket and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AnalyzeTextPayload, AnswerPayload, CompleteLessonPayload, CreateSessionPayload,
        ErrorResponse, QuizView, SelectTopicPayload, SessionView, SetViewModePayload,
        StartQuizPayload, UploadFilePayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::get_session,
        handlers::delete_session,
        handlers::analyze_material,
        handlers::upload_material_file,
        handlers::select_topic,
        handlers::complete_lesson,
        handlers::set_view_mode,
        handlers::get_progress,
        handlers::get_concept_map,
        handlers::get_recap,
        handlers::start_quiz,
        handlers::get_quiz,
        handlers::answer_question,
        handlers::next_question,
        handlers::list_listings,
        handlers::get_catalog,
        handlers::get_catalog_section,
    ),
    components(
        schemas(
            SessionView, CreateSessionPayload, AnalyzeTextPayload, UploadFilePayload,
            SelectTopicPayload, CompleteLessonPayload, SetViewModePayload, StartQuizPayload,
            AnswerPayload, QuizView, ErrorResponse
        )
    ),
    tags(
        (name = "Tutor API", description = "Lesson sessions, quizzes and listings for the AI tutor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/material", post(handlers::analyze_material))
        .route(
            "/sessions/{id}/material/file",
            post(handlers::upload_material_file),
        )
        .route("/sessions/{id}/topic", post(handlers::select_topic))
        .route(
            "/sessions/{id}/lessons/complete",
            post(handlers::complete_lesson),
        )
        .route("/sessions/{id}/view", patch(handlers::set_view_mode))
        .route("/sessions/{id}/progress", get(handlers::get_progress))
        .route("/sessions/{id}/concept-map", get(handlers::get_concept_map))
        .route("/sessions/{id}/recap", get(handlers::get_recap))
        .route(
            "/sessions/{id}/quiz",
            get(handlers::get_quiz).post(handlers::start_quiz),
        )
        .route(
            "/sessions/{id}/quiz/answer",
            post(handlers::answer_question),
        )
        .route("/sessions/{id}/quiz/next", post(handlers::next_question))
        .route("/sessions/{id}/chat", get(ws_handler))
        .route("/listings", get(handlers::list_listings))
        .route("/catalog", get(handlers::get_catalog))
        .route("/catalog/{slug}", get(handlers::get_catalog_section))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
