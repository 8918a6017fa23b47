//! Chat handler
//!
//! One question in, one grounded answer out. The session's conversation
//! lock is held for the whole pipeline run, so requests within a session
//! execute one at a time.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docsage_common::errors::{AppError, Result};
use docsage_common::metrics::RequestMetrics;

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    /// The user's question
    #[validate(length(min = 1, max = 2000))]
    pub messages: String,

    /// Target session; omitted means the default session
    pub session_id: Option<Uuid>,
}

/// Chat response
#[derive(Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: Uuid,
}

/// Answer a question within a session
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    let metrics = RequestMetrics::start("POST", "/v1/chat");

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if request.messages.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Question must not be blank".to_string(),
            field: Some("messages".to_string()),
        });
    }

    let (session_id, session) = state.sessions.resolve(request.session_id)?;

    // Serializes pipeline runs for this session.
    let mut conversation = session.lock().await;

    let answer = match state
        .pipeline
        .answer(&request.messages, &mut conversation)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            metrics.finish(e.status_code().as_u16());
            return Err(e);
        }
    };

    let latency_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        session_id = %session_id,
        turns = conversation.len(),
        latency_ms = latency_ms,
        "Chat completed"
    );
    metrics.finish(200);

    Ok(Json(ChatResponse {
        message: answer,
        session_id,
    }))
}
