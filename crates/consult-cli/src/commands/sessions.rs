//! `consult sessions`: Checkpoint inspection and maintenance.

use consult_core::state::AppState;

use super::print_json;

pub async fn list(state: &AppState, limit: usize) -> Result<(), String> {
    let sessions = state
        .session_store
        .list(limit)
        .await
        .map_err(|e| e.to_string())?;
    print_json(&serde_json::json!({ "sessions": sessions }));
    Ok(())
}

pub async fn show(state: &AppState, session_id: &str) -> Result<(), String> {
    let session = state
        .session_store
        .get(session_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Session not found: {}", session_id))?;
    print_json(&serde_json::json!({
        "session": session,
        "finalReport": session.final_report().map(|r| r.aggregated()),
    }));
    Ok(())
}

pub async fn delete(state: &AppState, session_id: &str) -> Result<(), String> {
    if !state
        .orchestrator
        .delete(session_id)
        .await
        .map_err(|e| e.to_string())?
    {
        return Err(format!("Session not found: {}", session_id));
    }
    println!("Deleted session {}", session_id);
    Ok(())
}

pub async fn evict(state: &AppState, older_than_secs: u64) -> Result<(), String> {
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(older_than_secs as i64);
    let evicted = state
        .session_store
        .evict_idle(cutoff)
        .await
        .map_err(|e| e.to_string())?;
    println!("Evicted {} session(s)", evicted);
    Ok(())
}
