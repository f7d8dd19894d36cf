//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (the LLM client, analyzer and quiz service).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tutor_api::{
    config::{Config, Provider},
    db::Db,
    router::create_router,
    state::AppState,
    store::SessionStore,
};
use tutor_core::{
    llm_client::{EchoLLMClient, LLMClient, OpenAICompatibleClient},
    material::{LLMMaterialAnalyzer, MaterialAnalyzer, MockMaterialAnalyzer},
    prompts::Prompts,
    quiz::{LLMQuizService, MockQuizService, QuizService},
};

const REQUIRED_PROMPTS: &[&str] = &[
    "analyze_material",
    "tutor_system",
    "generate_quiz",
    "grade_answer",
];

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

fn openai_config(config: &Config) -> anyhow::Result<OpenAIConfig> {
    let api_key = config
        .api_key()
        .context("The configured provider has no API key")?;
    let api_base = match config.provider {
        Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        _ => "https://api.openai.com/v1",
    };
    Ok(OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let prompts = Prompts::load_dir(&config.prompts_path).with_context(|| {
        format!(
            "Failed to load prompts from {}",
            config.prompts_path.display()
        )
    })?;
    prompts.require(REQUIRED_PROMPTS)?;
    let prompts = Arc::new(prompts);

    let (llm_client, material_analyzer, quiz_service): (
        Arc<dyn LLMClient>,
        Arc<dyn MaterialAnalyzer>,
        Arc<dyn QuizService>,
    ) = match &config.provider {
        Provider::OpenAI | Provider::Gemini => {
            info!(provider = ?config.provider, "Using OpenAI-compatible provider.");
            let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
                openai_config(&config)?,
                config.chat_model.clone(),
            ));
            (
                llm_client.clone(),
                Arc::new(LLMMaterialAnalyzer::new(llm_client.clone(), prompts.clone())),
                Arc::new(LLMQuizService::new(llm_client, prompts.clone())),
            )
        }
        Provider::Mock => {
            info!("Using offline mock services.");
            (
                Arc::new(EchoLLMClient),
                Arc::new(MockMaterialAnalyzer),
                Arc::new(MockQuizService),
            )
        }
    };

    let app_state = Arc::new(AppState {
        db,
        sessions: Arc::new(SessionStore::new()),
        llm_client,
        material_analyzer,
        quiz_service,
        prompts,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        enforce_topic_unlock = config.enforce_topic_unlock,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
