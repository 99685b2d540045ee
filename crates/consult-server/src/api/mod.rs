pub mod consult;
pub mod roles;
pub mod sessions;

use axum::Router;

use consult_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/consult", consult::router())
        .nest("/api/sessions", sessions::router())
        .nest("/api/roles", roles::router())
}
