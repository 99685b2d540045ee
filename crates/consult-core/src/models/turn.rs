use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::ActionRequest;

/// One immutable entry in a role's message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Turn {
    User {
        text: String,
        at: DateTime<Utc>,
    },
    Agent {
        role: String,
        text: String,
        #[serde(default)]
        actions: Vec<ActionRequest>,
        at: DateTime<Utc>,
    },
    ActionResult {
        action_id: String,
        text: String,
        at: DateTime<Utc>,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn agent(role: impl Into<String>, text: impl Into<String>, actions: Vec<ActionRequest>) -> Self {
        Self::Agent {
            role: role.into(),
            text: text.into(),
            actions,
            at: Utc::now(),
        }
    }

    pub fn action_result(action_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ActionResult {
            action_id: action_id.into(),
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::User { text, .. } | Self::Agent { text, .. } | Self::ActionResult { text, .. } => text,
        }
    }

    pub fn actions(&self) -> &[ActionRequest] {
        match self {
            Self::Agent { actions, .. } => actions,
            _ => &[],
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent { .. })
    }

    pub fn resolves(&self) -> Option<&str> {
        match self {
            Self::ActionResult { action_id, .. } => Some(action_id),
            _ => None,
        }
    }
}
