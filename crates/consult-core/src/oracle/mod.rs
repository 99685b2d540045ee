//! Decision oracle: the opaque text-in / text-or-actions-out collaborator
//! behind every agent node.
//!
//! ```text
//! AgentNode ──► DecisionRequest ──► dyn DecisionOracle
//!                                       ├── HttpOracle (OpenAI-compatible / Anthropic)
//!                                       └── ScriptedOracle (tests, offline demos)
//! ```

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ActionKind, ActionRequest, Turn};

pub use http::{HttpOracle, OracleAdapter, OracleConfig};
pub use scripted::ScriptedOracle;

/// Everything the oracle sees for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub role_id: String,
    /// Role instructions followed by the session-wide facts.
    pub instructions: String,
    /// The role's full message stream.
    pub transcript: Vec<Turn>,
    /// Actions the role is bound to.
    pub actions: Vec<ActionKind>,
}

/// Oracle output: text and/or requested actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub text: String,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
}

impl Decision {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(kind: ActionKind, arguments: serde_json::Value) -> Self {
        Self {
            text: String::new(),
            actions: vec![ActionRequest::new(kind, arguments)],
        }
    }

    pub fn with_action(mut self, kind: ActionKind, arguments: serde_json::Value) -> Self {
        self.actions.push(ActionRequest::new(kind, arguments));
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// Rate limit, timeout, overload: worth retrying.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Bad request, auth, malformed response: retrying will not help.
    #[error("provider error: {0}")]
    Permanent(String),
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError>;
}
