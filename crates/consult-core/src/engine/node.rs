//! Agent node: one oracle decision per invocation.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{Session, Turn};
use crate::oracle::{DecisionOracle, DecisionRequest, OracleError};
use crate::roles::{RoleDef, RoleRegistry};

use super::retry::RetryPolicy;

/// Runs a role against the decision oracle. Appends nothing itself: the
/// returned turn is committed by the scheduler.
#[derive(Clone)]
pub struct AgentNode {
    oracle: Arc<dyn DecisionOracle>,
    retry: RetryPolicy,
}

impl AgentNode {
    pub fn new(oracle: Arc<dyn DecisionOracle>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    /// Context for one decision: role instructions, session-wide facts and
    /// the role's full stream.
    pub fn build_request(registry: &RoleRegistry, role: &RoleDef, session: &Session) -> DecisionRequest {
        DecisionRequest {
            role_id: role.id.clone(),
            instructions: format!("{}\n\n{}", role.system_prompt, session_facts(registry, role, session)),
            transcript: session.stream(role.stream()).to_vec(),
            actions: role.actions.clone(),
        }
    }

    pub async fn run(
        &self,
        registry: &RoleRegistry,
        role: &RoleDef,
        session: &Session,
    ) -> Result<Turn, OracleError> {
        let request = Self::build_request(registry, role, session);
        let label = format!("{}/{}", session.id, role.id);

        let decision = self
            .retry
            .run(&label, || self.oracle.decide(&request))
            .await?;

        // Ids must be unique across the role's stream: a reused id would
        // look already answered and skip its gate.
        let mut taken: HashSet<String> = session
            .stream(role.stream())
            .iter()
            .flat_map(|turn| {
                turn.actions()
                    .iter()
                    .map(|a| a.id.clone())
                    .chain(turn.resolves().map(str::to_string))
            })
            .collect();
        let mut actions = decision.actions;
        for action in actions.iter_mut() {
            if action.id.trim().is_empty() || taken.contains(&action.id) {
                let fresh = uuid::Uuid::new_v4().to_string();
                if !action.id.trim().is_empty() {
                    tracing::debug!("[AgentNode] {} reissued duplicate action id {} as {}", label, action.id, fresh);
                }
                action.id = fresh;
            }
            taken.insert(action.id.clone());
        }

        tracing::debug!(
            "[AgentNode] {} produced {} chars, {} action(s)",
            label,
            decision.text.len(),
            actions.len()
        );

        Ok(Turn::agent(role.id.clone(), decision.text, actions))
    }
}

fn session_facts(registry: &RoleRegistry, role: &RoleDef, session: &Session) -> String {
    let mut facts = String::from("## Current patient data\n");
    facts.push_str(session.case_summary().unwrap_or("None"));

    facts.push_str("\n\n## Findings logged so far\n");
    if session.evidence().is_empty() {
        facts.push_str("None");
    } else {
        for finding in session.evidence() {
            facts.push_str("- ");
            facts.push_str(finding);
            facts.push('\n');
        }
    }

    for helper in registry.all().iter().filter(|r| r.helper_family().is_some()) {
        let Some(family) = helper.helper_family() else {
            continue;
        };
        facts.push_str(&format!("\n\n## {} QnA\n", helper.name));
        let entries = session.qna(family);
        if entries.is_empty() {
            facts.push_str("None");
        } else {
            facts.push_str(&entries.join("\n"));
        }
    }

    if role.helper_family().is_some() {
        let caller = session
            .current_caller()
            .and_then(|id| registry.get(id))
            .map(|r| r.name.as_str())
            .unwrap_or("unknown");
        facts.push_str(&format!("\n\n## Calling specialist\n{}", caller));
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionKind, ActionRequest, HelperFamily, StreamKey};
    use crate::oracle::{Decision, ScriptedOracle};

    #[tokio::test]
    async fn test_run_fills_missing_action_ids() {
        let registry = RoleRegistry::builtin().unwrap();
        let oracle = Arc::new(ScriptedOracle::new());
        let mut decision = Decision::text("Which eye?");
        decision.actions.push(ActionRequest::with_id(
            "",
            ActionKind::InteractiveQuestion,
            serde_json::json!({"question": "Which eye?"}),
        ));
        oracle.push("intake", Ok(decision));

        let node = AgentNode::new(oracle.clone(), RetryPolicy::default());
        let session = Session::new("intake");
        let turn = node.run(&registry, registry.intake(), &session).await.unwrap();

        assert_eq!(turn.actions().len(), 1);
        assert_eq!(turn.actions()[0].id.len(), 36);
        assert_eq!(oracle.calls_for("intake"), 1);
    }

    #[tokio::test]
    async fn test_run_reissues_reused_action_ids() {
        let registry = RoleRegistry::builtin().unwrap();
        let oracle = Arc::new(ScriptedOracle::new());
        let mut decision = Decision::text("");
        for question in ["Any allergies?", "Any medication?"] {
            decision.actions.push(ActionRequest::with_id(
                "call_0",
                ActionKind::InteractiveQuestion,
                serde_json::json!({ "question": question }),
            ));
        }
        oracle.push("intake", Ok(decision));

        let mut session = Session::new("intake");
        session.append(
            StreamKey::Intake,
            Turn::agent(
                "intake",
                "",
                vec![ActionRequest::with_id(
                    "call_0",
                    ActionKind::InteractiveQuestion,
                    serde_json::json!({"question": "How old are you?"}),
                )],
            ),
        );
        assert!(session.resolve(StreamKey::Intake, "call_0", "34"));

        let node = AgentNode::new(oracle, RetryPolicy::default());
        let turn = node.run(&registry, registry.intake(), &session).await.unwrap();

        let ids: Vec<&str> = turn.actions().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"call_0"));
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_run_keeps_fresh_provider_ids() {
        let registry = RoleRegistry::builtin().unwrap();
        let oracle = Arc::new(ScriptedOracle::new());
        let mut decision = Decision::text("");
        decision.actions.push(ActionRequest::with_id(
            "call_7",
            ActionKind::CompileCase,
            serde_json::json!({"data": "adult"}),
        ));
        oracle.push("intake", Ok(decision));

        let node = AgentNode::new(oracle, RetryPolicy::default());
        let turn = node.run(&registry, registry.intake(), &Session::new("intake")).await.unwrap();
        assert_eq!(turn.actions()[0].id, "call_7");
    }

    #[test]
    fn test_request_carries_case_qna_and_caller() {
        let registry = RoleRegistry::builtin().unwrap();
        let radiology = registry.helper(HelperFamily::Radiology);
        let mut session = Session::new("intake");
        session.set_case_summary("34-year-old, wrist pain".into());
        session.push_caller("orthopedics");
        session.append_qna(HelperFamily::Radiology, "Question from Orthopedist to Radiologist:");
        session.append(StreamKey::Radiology, Turn::user("seed"));
        session.append(StreamKey::Intake, Turn::user("not for radiology"));

        let request = AgentNode::build_request(&registry, radiology, &session);

        assert_eq!(request.role_id, "radiology");
        assert!(request.instructions.contains("34-year-old, wrist pain"));
        assert!(request.instructions.contains("Question from Orthopedist to Radiologist:"));
        assert!(request.instructions.contains("## Calling specialist\nOrthopedist"));
        assert_eq!(request.transcript.len(), 1);
        assert!(!request.actions.contains(&ActionKind::KnowledgeRetrieve));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_returned() {
        let registry = RoleRegistry::builtin().unwrap();
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.fail("intake", OracleError::Permanent("401".into()));
        let node = AgentNode::new(oracle, RetryPolicy::default());

        let result = node.run(&registry, registry.intake(), &Session::new("intake")).await;
        assert!(matches!(result, Err(OracleError::Permanent(_))));
    }
}
