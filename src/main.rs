//! MindEase - mental-health support chat service
//!
//! Serves a small JSON API around a conversation orchestrator that filters
//! off-topic messages, adapts its tone to the user's energy, and renders
//! replies for both display and speech.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;
mod config;
mod conversation;
mod core;
mod format;
mod providers;
mod routes;
mod speech;

use crate::config::{Config, PromptTemplate};
use crate::core::{ChatEngine, PreferenceStore, SessionStore};
use crate::providers::Provider;
use crate::speech::Unavailable;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindease=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let client = config.load_client_config()?;

    let template = match &client.assistant.persona_file {
        Some(path) => PromptTemplate::load_from_file(path).await?,
        None => PromptTemplate::builtin(&client.assistant.name),
    };
    tracing::info!(persona = %template.persona.name, "Loaded persona");

    let preferences = Arc::new(PreferenceStore::new(&config.data_dir.join("mindease.db")).await?);

    let provider = Provider::from_config(&client, config.api_key(&client))?;
    tracing::info!(provider = %client.llm.provider, model = %client.llm.model, "Completion service ready");

    // No speech backend on the server; clients report their own capabilities.
    let engine = ChatEngine::new(Arc::new(provider), preferences)
        .with_client_config(&client)
        .with_prompt_template(template)
        .with_speech(
            Arc::new(Unavailable),
            Arc::new(Unavailable),
            client.speech.clone(),
        );

    let state = AppState {
        engine: Arc::new(engine),
        sessions: Arc::new(SessionStore::with_settings(&client.sessions)),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("MindEase API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
