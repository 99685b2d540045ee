//! Scripted oracle: replays queued decisions per role.
//!
//! Used by the test suites and for offline demos of the workflow.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Decision, DecisionOracle, DecisionRequest, OracleError};
use crate::models::ActionKind;

#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, VecDeque<Result<Decision, OracleError>>>>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next decision of `role`.
    pub fn push(&self, role: &str, outcome: Result<Decision, OracleError>) -> &Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(role.to_string()).or_default().push_back(outcome);
        }
        self
    }

    pub fn say(&self, role: &str, text: &str) -> &Self {
        self.push(role, Ok(Decision::text(text)))
    }

    pub fn act(&self, role: &str, kind: ActionKind, arguments: serde_json::Value) -> &Self {
        self.push(role, Ok(Decision::action(kind, arguments)))
    }

    pub fn ask(&self, role: &str, question: &str) -> &Self {
        self.act(
            role,
            ActionKind::InteractiveQuestion,
            serde_json::json!({ "question": question }),
        )
    }

    pub fn fail(&self, role: &str, error: OracleError) -> &Self {
        self.push(role, Err(error))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, role: &str) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.role_id == role).count())
            .unwrap_or(0)
    }

    /// Outcomes still queued across all roles.
    pub fn remaining(&self) -> usize {
        self.scripts
            .lock()
            .map(|s| s.values().map(|q| q.len()).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .scripts
            .lock()
            .map_err(|e| OracleError::Permanent(format!("Lock poisoned: {}", e)))?
            .get_mut(&request.role_id)
            .and_then(|q| q.pop_front());

        next.unwrap_or_else(|| {
            Err(OracleError::Permanent(format!(
                "script exhausted for role '{}'",
                request.role_id
            )))
        })
    }
}
