//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET    /v1/tools`                   : List the tool catalogue
//! - `GET    /v1/events`                  : SSE stream of domain events
//! - `POST   /v1/sessions/{id}/messages`  : Send a message, get the reply
//! - `GET    /v1/sessions/{id}`           : The session transcript
//! - `POST   /v1/sessions/{id}/reset`     : Truncate to the system message
//! - `DELETE /v1/sessions/{id}`           : Forget the session

use crate::SharedState;
use crate::auth::Caller;
use crate::error::ApiError;
use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use recruitr_core::event::DomainEvent;
use recruitr_core::message::Message;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/tools", get(list_tools_handler))
        .route("/events", get(event_stream_handler))
        .route("/sessions/{id}/messages", post(post_message_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/{id}/reset", post(reset_session_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub session_id: String,
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub session_id: String,
    pub reset: bool,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDto> = state
        .orchestrator
        .dispatcher()
        .registry()
        .definitions()
        .into_iter()
        .map(|d| ToolDto {
            name: d.name,
            description: d.description,
            parameters: d.parameters,
        })
        .collect();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

async fn post_message_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    info!(%session_id, message_len = payload.message.len(), "v1/sessions message");

    state
        .orchestrator
        .authorize(&session_id, caller.identity())
        .await?;
    if let Caller(Some(verified)) = caller {
        state
            .orchestrator
            .store_credential(&session_id, verified.token, verified.user_id)
            .await?;
    }

    let response = state
        .orchestrator
        .submit_message(&session_id, &payload.message)
        .await?;
    Ok(Json(MessageResponse {
        session_id,
        response,
    }))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    state
        .orchestrator
        .authorize(&session_id, caller.identity())
        .await?;
    let transcript = state.orchestrator.transcript(&session_id).await?;
    Ok(Json(TranscriptResponse {
        session_id,
        messages: transcript.messages().to_vec(),
    }))
}

async fn reset_session_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ResetResponse>, ApiError> {
    state
        .orchestrator
        .authorize(&session_id, caller.identity())
        .await?;
    state.orchestrator.reset_session(&session_id).await?;
    Ok(Json(ResetResponse {
        session_id,
        reset: true,
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<StatusCode, ApiError> {
    state
        .orchestrator
        .authorize(&session_id, caller.identity())
        .await?;
    state.orchestrator.end_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/events`: turn, tool, reset and error events as they happen.
async fn event_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.orchestrator.events().subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            let name = match event.as_ref() {
                DomainEvent::TurnCompleted { .. } => "turn_completed",
                DomainEvent::ToolExecuted { .. } => "tool_executed",
                DomainEvent::SessionReset { .. } => "session_reset",
                DomainEvent::ErrorOccurred { .. } => "error_occurred",
            };
            Ok(SseEvent::default().event(name).data(data))
        });
    Sse::new(stream)
}
