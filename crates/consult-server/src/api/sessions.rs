use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use consult_core::error::ServerError;
use consult_core::state::AppState;

const DEFAULT_LIMIT: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/{session_id}", get(get_session).delete(delete_session))
}

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    limit: Option<usize>,
}

/// GET /api/sessions: Checkpoint summaries, most recently updated first.
async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let sessions = state
        .session_store
        .list(query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(serde_json::json!({ "sessions": sessions })))
}

/// GET /api/sessions/{session_id}: Full session snapshot.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let session = state
        .session_store
        .get(&session_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Session not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "session": session,
        "finalReport": session.final_report().map(|r| r.aggregated()),
    })))
}

/// DELETE /api/sessions/{session_id}: Evict a session.
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.orchestrator.delete(&session_id).await? {
        return Err(ServerError::NotFound("Session not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
