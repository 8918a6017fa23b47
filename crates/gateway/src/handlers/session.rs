//! Session handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use docsage_common::conversation::Turn;
use docsage_common::errors::Result;

/// Response for session creation
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// Response for session inspection
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub turn_count: usize,
    pub turns: Vec<Turn>,
}

/// Create a new empty session
pub async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session_id = state.sessions.create();
    tracing::info!(
        session_id = %session_id,
        active_sessions = state.sessions.len(),
        "Session created"
    );
    Json(CreateSessionResponse { session_id })
}

/// Get the committed turns of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let turns = state.sessions.turns(id).await?;
    Ok(Json(SessionResponse {
        session_id: id,
        turn_count: turns.len(),
        turns,
    }))
}
