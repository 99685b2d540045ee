use axum::{extract::State, routing::get, Json, Router};

use consult_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_roles))
}

/// GET /api/roles: Registered roles in routing order.
async fn list_roles(State(state): State<AppState>) -> Json<serde_json::Value> {
    let roles: Vec<serde_json::Value> = state
        .registry
        .all()
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "name": r.name,
                "kind": r.kind,
                "family": r.family,
                "description": r.description,
                "actions": r.actions,
                "keywords": r.keywords,
                "knowledgeDomain": r.knowledge_domain,
            })
        })
        .collect();
    Json(serde_json::json!({
        "roles": roles,
        "fallbackRole": state.registry.fallback_role().id,
    }))
}
