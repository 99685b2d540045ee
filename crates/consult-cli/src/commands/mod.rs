//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the consult-core domain logic through `AppState`.

pub mod chat;
pub mod roles;
pub mod server;
pub mod sessions;

use consult_core::state::AppState;
use std::sync::Arc;

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// This mirrors `consult_server::create_app_state` but avoids starting
/// the HTTP server for non-server commands.
pub async fn init_state(db_path: &str) -> AppState {
    let db = consult_core::Database::open(db_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", db_path, e);
        std::process::exit(1);
    });

    let config = consult_core::ConsultConfig::from_env();
    let inner = consult_core::AppStateInner::from_config(db, &config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize consultation engine: {}", e);
        std::process::exit(1);
    });

    Arc::new(inner)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
