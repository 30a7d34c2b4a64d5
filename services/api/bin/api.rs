//! Main Entrypoint for the Glimpse API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Constructing the completion client for the configured provider and
//!    wiring the capture collaborators.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use glimpse_api::{
    config::{Config, ProviderKind},
    router::create_router,
    state::AppState,
};
use glimpse_core::{
    capture::{MockAudioSource, MockScreenSource},
    completion::{
        CompletionClient, HttpCompletionClient, ModelParams, OpenAiProfile, OpenRouterProfile,
        ProviderProfile,
    },
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let provider: Box<dyn ProviderProfile> = match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProfile {
            api_key: config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the 'openai' provider")?,
        }),
        ProviderKind::OpenRouter => Box::new(OpenRouterProfile {
            api_key: config
                .openrouter_api_key
                .clone()
                .context("OPENROUTER_API_KEY is required for the 'openrouter' provider")?,
            referer: config.referer.clone(),
            title: config.title.clone(),
        }),
    };
    info!(provider = provider.name(), "Using completion provider");

    let completion: Arc<dyn CompletionClient> = Arc::new(HttpCompletionClient::new(
        provider.as_ref(),
        ModelParams {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        },
    )?);

    // Platform capture backends (OCR, transcription) plug in here. The
    // stubs keep the service runnable without either.
    let app_state = Arc::new(AppState {
        screen: Arc::new(MockScreenSource::new("")),
        audio: Arc::new(MockAudioSource::new("")),
        completion,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        model = %config.model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
