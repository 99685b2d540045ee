//! External collaborators consumed by the action executor.
//!
//! Both are stateless and safe to call concurrently across sessions.

pub mod knowledge;
pub mod search;

pub use knowledge::{HttpKnowledgeBackend, KnowledgeBackend, KnowledgeDomain};
pub use search::{SearchBackend, TavilySearch};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}
