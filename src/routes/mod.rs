//! API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::core::ChatOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub outcome: Option<ChatOutcome>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Preferences {
    pub auto_speak: bool,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub speech_capture: bool,
    pub speech_synthesis: bool,
}

type ApiError = (StatusCode, String);

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn session_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let id = session_id(request.session_id);
    let session = state.sessions.load(&id).await;

    let outcome = state.engine.respond(&request.message, &session).await;
    if let Some(outcome) = &outcome {
        state.sessions.save(&id, outcome.session.clone()).await;
    }

    Json(ChatResponse {
        session_id: id,
        outcome,
    })
}

async fn voice(
    State(state): State<AppState>,
    request: Option<Json<VoiceRequest>>,
) -> Json<ChatResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let id = session_id(request.session_id);
    let session = state.sessions.load(&id).await;

    let outcome = state.engine.respond_to_voice(&session).await;
    if let Some(outcome) = &outcome {
        state.sessions.save(&id, outcome.session.clone()).await;
    }

    Json(ChatResponse {
        session_id: id,
        outcome,
    })
}

async fn end_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.remove(&id).await {
        tracing::info!(session = %id, "Session cleared");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_preferences(State(state): State<AppState>) -> Result<Json<Preferences>, ApiError> {
    let auto_speak = state
        .engine
        .preferences()
        .auto_speak()
        .await
        .map_err(internal_error)?;
    Ok(Json(Preferences { auto_speak }))
}

async fn put_preferences(
    State(state): State<AppState>,
    Json(prefs): Json<Preferences>,
) -> Result<Json<Preferences>, ApiError> {
    state
        .engine
        .preferences()
        .set_auto_speak(prefs.auto_speak)
        .await
        .map_err(internal_error)?;

    if !prefs.auto_speak {
        state.engine.stop_speech();
    }
    Ok(Json(prefs))
}

async fn capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    Json(Capabilities {
        speech_capture: state.engine.speech_capture_supported(),
        speech_synthesis: state.engine.speech_synthesis_supported(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/voice", post(voice))
        .route("/v1/sessions/:id", delete(end_session))
        .route("/v1/preferences", get(get_preferences).put(put_preferences))
        .route("/v1/capabilities", get(capabilities))
}
