//! `consult roles`: Show the role registry.

use consult_core::state::AppState;

use super::print_json;

pub fn list(state: &AppState) -> Result<(), String> {
    let roles: Vec<serde_json::Value> = state
        .registry
        .all()
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "name": r.name,
                "kind": r.kind,
                "actions": r.actions,
                "keywords": r.keywords,
            })
        })
        .collect();
    print_json(&serde_json::json!({
        "roles": roles,
        "fallbackRole": state.registry.fallback_role().id,
    }));
    Ok(())
}
