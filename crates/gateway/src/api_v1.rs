//! HTTP API v1: sessions and messages.
//!
//! Endpoints:
//!
//! - `POST   /v1/sessions`                Start a session
//! - `GET    /v1/sessions/{id}`           Full transcript (page refresh replay)
//! - `DELETE /v1/sessions/{id}`           End a session
//! - `POST   /v1/sessions/{id}/messages`  Submit a message, get the new turns
//! - `POST   /v1/chat`                    One-shot get-or-create convenience
//! - `GET    /v1/status`                  Runtime status

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use askdesk_chat::{Runtime, SessionError, SubmitError};
use askdesk_core::{AdvisoryKind, SessionId, Turn};

pub type SharedApiState = Arc<Runtime>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(end_session_handler),
        )
        .route("/sessions/{id}/messages", post(submit_message_handler))
        .route("/chat", post(chat_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct CreateSessionResponse {
    id: String,
    created_at: String,
}

#[derive(Serialize, Deserialize)]
struct TranscriptResponse {
    id: String,
    turns: Vec<Turn>,
    created_at: String,
    updated_at: String,
}

#[derive(Deserialize)]
struct SubmitRequest {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SubmitResponse {
    session_id: String,
    /// Only the turns this submission appended.
    turns: Vec<Turn>,
}

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing session ID (omit, or pass an expired one, to start fresh).
    #[serde(default)]
    session_id: Option<String>,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    session_id: String,
    response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advisory: Option<AdvisoryKind>,
}

#[derive(Serialize, Deserialize)]
struct StatusResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    provider: String,
    model: String,
    history: String,
    active_sessions: usize,
    fallback_contact: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a rejected submission to its HTTP status.
fn submit_error(e: SubmitError) -> ApiError {
    let status = match &e {
        SubmitError::EmptyMessage => StatusCode::BAD_REQUEST,
        SubmitError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
        SubmitError::Session(SessionError::Busy(_)) => StatusCode::CONFLICT,
    };
    api_error(status, e.to_string())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let created = state.sessions.create().await;

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            id: created.id.to_string(),
            created_at: created.created_at.to_rfc3339(),
        }),
    )
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, StatusCode> {
    let session = state
        .sessions
        .snapshot(&SessionId(id))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(Json(TranscriptResponse {
        id: session.id.to_string(),
        turns: session.turns().to_vec(),
        created_at: session.created_at.to_rfc3339(),
        updated_at: session.updated_at.to_rfc3339(),
    }))
}

async fn end_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.sessions.end(&SessionId(id)).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn submit_message_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let id = SessionId(id);
    let turns = state
        .submit(&id, &payload.text)
        .await
        .map_err(submit_error)?;

    Ok(Json(SubmitResponse {
        session_id: id.to_string(),
        turns,
    }))
}

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(submit_error(SubmitError::EmptyMessage));
    }

    let mut existing = None;
    if let Some(requested) = payload.session_id.map(SessionId) {
        if state.sessions.contains(&requested).await {
            existing = Some(requested);
        }
    }
    let id = match existing {
        Some(id) => id,
        None => {
            let created = state.sessions.create().await;
            info!(session_id = %created.id, "v1/chat started a new session");
            created.id
        }
    };

    let turns = state
        .submit(&id, &payload.message)
        .await
        .map_err(submit_error)?;

    let reply = turns
        .last()
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "no reply recorded"))?;

    Ok(Json(ChatResponse {
        session_id: id.to_string(),
        response: reply.text.clone(),
        advisory: reply.advisory,
    }))
}

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.uptime_secs(),
        provider: state.orchestrator.provider_name().into(),
        model: state.orchestrator.model().into(),
        history: state.orchestrator.history_policy().to_string(),
        active_sessions: state.sessions.len().await,
        fallback_contact: state.knowledge.fallback_contact().into(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
