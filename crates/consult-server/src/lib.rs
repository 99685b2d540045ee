//! Consult Server: HTTP façade for the consultation orchestrator.
//!
//! A standalone Rust backend server providing:
//! - RESTful HTTP API via axum
//! - Server-Sent Events streams for starting and resuming consultations
//! - SQLite checkpoint store with rusqlite (via consult-core)
//!
//! This crate can be used standalone or embedded in other applications
//! (e.g., the `consult` CLI).

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use consult_core::config::default_db_path;
use consult_core::{AppState, AppStateInner, ConsultConfig, Database};

/// Configuration for the Consult backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Evict sessions idle (not running) for longer than this.
    pub session_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            db_path: default_db_path(),
            session_ttl_secs: None,
        }
    }
}

/// Create a shared `AppState` from a database path, with collaborators
/// configured from the environment.
pub async fn create_app_state(db_path: &str) -> Result<AppState, String> {
    create_app_state_with_config(db_path, &ConsultConfig::from_env()).await
}

pub async fn create_app_state_with_config(
    db_path: &str,
    config: &ConsultConfig,
) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let inner = AppStateInner::from_config(db, config)
        .map_err(|e| format!("Failed to initialize consultation engine: {}", e))?;

    Ok(Arc::new(inner))
}

/// Start the Consult backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing (the CLI may already have installed a subscriber)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consult_server=info,consult_core=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting Consult backend server on {}:{}",
        config.host,
        config.port
    );

    let consult = ConsultConfig::from_env();
    let state = create_app_state_with_config(&config.db_path, &consult).await?;
    let session_ttl_secs = effective_ttl(&config, &consult);
    let config = ServerConfig {
        session_ttl_secs,
        ..config
    };

    start_server_with_state(config, state).await
}

/// An explicit server TTL wins over `CONSULT_SESSION_TTL_SECS`.
fn effective_ttl(config: &ServerConfig, consult: &ConsultConfig) -> Option<u64> {
    config.session_ttl_secs.or(consult.session_ttl_secs)
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Consult backend server listening on {}", local_addr);

    if let Some(ttl) = config.session_ttl_secs.filter(|t| *t > 0) {
        spawn_eviction(state, ttl);
    }

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

/// Periodically evict sessions left idle longer than `ttl_secs`.
fn spawn_eviction(state: AppState, ttl_secs: u64) {
    let period = Duration::from_secs(ttl_secs.clamp(1, 300));
    tracing::info!(
        "Evicting idle sessions after {}s (checked every {:?})",
        ttl_secs,
        period
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::seconds(ttl_secs as i64);
            if let Err(e) = state.session_store.evict_idle(cutoff).await {
                tracing::warn!("Session eviction failed: {}", e);
            }
        }
    });
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "consult-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
