//! Shared application state for the axum server and the CLI.

use std::sync::Arc;

use crate::collaborators::{HttpKnowledgeBackend, KnowledgeBackend, SearchBackend, TavilySearch};
use crate::config::ConsultConfig;
use crate::db::Database;
use crate::engine::{ActionExecutor, Orchestrator};
use crate::error::ServerError;
use crate::oracle::{DecisionOracle, HttpOracle};
use crate::roles::RoleRegistry;
use crate::store::SessionStore;

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub db: Database,
    pub session_store: SessionStore,
    pub registry: Arc<RoleRegistry>,
    pub orchestrator: Orchestrator,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Wire the HTTP collaborators named by `config`.
    pub fn from_config(db: Database, config: &ConsultConfig) -> Result<Self, ServerError> {
        if config.oracle.api_key.is_empty() {
            tracing::warn!("[State] No oracle API key configured; decisions will fail until one is set");
        }
        Self::with_collaborators(
            db,
            config,
            Arc::new(HttpOracle::new(config.oracle.clone())),
            Arc::new(TavilySearch::new(config.tavily_api_key.clone())),
            Arc::new(HttpKnowledgeBackend::new(config.knowledge_url.clone())),
        )
    }

    /// Wire explicit collaborators (tests, offline demos).
    pub fn with_collaborators(
        db: Database,
        config: &ConsultConfig,
        oracle: Arc<dyn DecisionOracle>,
        search: Arc<dyn SearchBackend>,
        knowledge: Arc<dyn KnowledgeBackend>,
    ) -> Result<Self, ServerError> {
        let registry = RoleRegistry::load(config.roles_dir.as_deref(), &config.engine.fallback_role)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let registry = Arc::new(registry);
        let session_store = SessionStore::new(db.clone());
        let orchestrator = Orchestrator::new(
            registry.clone(),
            session_store.clone(),
            oracle,
            ActionExecutor::new(search, knowledge),
            &config.engine,
        );
        tracing::info!("[State] {} roles registered", registry.all().len());
        Ok(Self {
            db,
            session_store,
            registry,
            orchestrator,
        })
    }
}
