use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};

use consult_core::error::ServerError;
use consult_core::state::AppState;
use consult_core::Run;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start/stream", get(start_stream))
        .route("/resume/stream", get(resume_stream))
}

#[derive(Debug, Deserialize)]
struct StartQuery {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeQuery {
    session_id: Option<String>,
    answer: Option<String>,
}

/// GET /api/consult/start/stream?message=...: Start a consultation.
///
/// Emits `session`, then `message`/`action` events until the session
/// suspends (`awaiting-input`), finishes (`final`) or fails (`error`).
async fn start_stream(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let message = query.message.unwrap_or_default();
    let run = state.orchestrator.start(&message).await?;
    Ok(sse(run))
}

/// GET /api/consult/resume/stream?sessionId=...&answer=...: Answer the
/// pending question and continue.
///
/// Errors are returned before any streaming starts: 404 unknown session,
/// 400 no pending question, 409 session busy.
async fn resume_stream(
    State(state): State<AppState>,
    Query(query): Query<ResumeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let session_id = query
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("sessionId is required".to_string()))?;
    let answer = query.answer.unwrap_or_default();
    let run = state.orchestrator.resume(&session_id, &answer).await?;
    Ok(sse(run))
}

fn sse(run: Run) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("[SSE] Streaming session {}", run.session_id);
    let mut events = run.into_stream();
    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            yield Ok::<_, Infallible>(
                Event::default().event(event.name()).data(event.data().to_string())
            );
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
