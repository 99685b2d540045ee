//! Action executor: resolves a role's pending non-interactive actions.

use std::sync::Arc;

use crate::collaborators::{KnowledgeBackend, KnowledgeDomain, SearchBackend};
use crate::models::{ActionKind, ActionRequest};
use crate::roles::RoleDef;

pub const FINDING_ACK: &str = "Report added to patient's record.";
pub const CASE_ACK: &str = "Patient data compiled, recommend a specialist.";

/// Outcome of one executor step: one result per action, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub results: Vec<(String, String)>,
    /// New case summary from `compile-case`, if the role may write it.
    pub case_summary: Option<String>,
}

#[derive(Clone)]
pub struct ActionExecutor {
    search: Arc<dyn SearchBackend>,
    knowledge: Arc<dyn KnowledgeBackend>,
}

impl ActionExecutor {
    pub fn new(search: Arc<dyn SearchBackend>, knowledge: Arc<dyn KnowledgeBackend>) -> Self {
        Self { search, knowledge }
    }

    /// Resolve `pending` for `role`. Interactive questions must be filtered
    /// out by the caller; any that slip through get a notice instead of an
    /// answer.
    pub async fn execute(&self, role: &RoleDef, pending: &[ActionRequest]) -> Execution {
        let mut execution = Execution::default();
        for action in pending {
            let text = if !role.allows(action.kind) {
                format!(
                    "Action '{}' is not available to {}. Use one of: {}.",
                    action.kind,
                    role.name,
                    role.actions
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            } else {
                self.run_one(role, action, &mut execution).await
            };
            execution.results.push((action.id.clone(), text));
        }
        execution
    }

    async fn run_one(&self, role: &RoleDef, action: &ActionRequest, execution: &mut Execution) -> String {
        match action.kind {
            ActionKind::WebSearch => match action.arg("query") {
                Some(query) => {
                    tracing::info!("[Executor] {} web search: {}", role.id, query);
                    self.search.search(query).await
                }
                None => missing(action, "query"),
            },
            ActionKind::KnowledgeRetrieve => {
                let Some(query) = action.arg("query") else {
                    return missing(action, "query");
                };
                let domain = action
                    .arg("domain")
                    .and_then(KnowledgeDomain::from_hint)
                    .or(role.knowledge_domain);
                let Some(domain) = domain else {
                    return format!(
                        "Knowledge retrieval failed: unknown domain '{}'",
                        action.arg("domain").unwrap_or_default()
                    );
                };
                tracing::info!("[Executor] {} knowledge retrieval ({}): {}", role.id, domain, query);
                match self.knowledge.retrieve(query, domain).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("[Executor] Knowledge retrieval failed: {}", e);
                        format!("Knowledge retrieval failed: {}", e)
                    }
                }
            }
            // The finding itself is copied to the evidence log by the scheduler.
            ActionKind::LogFinding => match action.arg("report") {
                Some(_) => FINDING_ACK.to_string(),
                None => missing(action, "report"),
            },
            ActionKind::CompileCase => match action.arg("data") {
                Some(data) => {
                    execution.case_summary = Some(data.to_string());
                    CASE_ACK.to_string()
                }
                None => missing(action, "data"),
            },
            ActionKind::Delegate | ActionKind::Finalize => format!(
                "Action '{}' was not applied: request exactly one control action per turn, \
                 with a valid target, and no other pending actions.",
                action.kind
            ),
            ActionKind::InteractiveQuestion => match action.arg("question") {
                Some(_) => "Question skipped: ask one question per turn.".to_string(),
                None => missing(action, "question"),
            },
        }
    }
}

fn missing(action: &ActionRequest, arg: &str) -> String {
    format!("Action '{}' requires a '{}' argument.", action.kind, arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::roles::RoleRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoSearch;

    #[async_trait]
    impl SearchBackend for EchoSearch {
        async fn search(&self, query: &str) -> String {
            format!("results for {}", query)
        }
    }

    #[derive(Default)]
    struct RecordingKnowledge {
        domains: Mutex<Vec<KnowledgeDomain>>,
        fail: bool,
    }

    #[async_trait]
    impl KnowledgeBackend for RecordingKnowledge {
        async fn retrieve(&self, query: &str, domain: KnowledgeDomain) -> Result<String, CollaboratorError> {
            self.domains.lock().unwrap().push(domain);
            if self.fail {
                Err(CollaboratorError::Request("connection refused".into()))
            } else {
                Ok(format!("{} says: {}", domain, query))
            }
        }
    }

    fn action(id: &str, kind: ActionKind, args: serde_json::Value) -> ActionRequest {
        ActionRequest::with_id(id, kind, args)
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let registry = RoleRegistry::builtin().unwrap();
        let knowledge = Arc::new(RecordingKnowledge::default());
        let executor = ActionExecutor::new(Arc::new(EchoSearch), knowledge.clone());
        let derm = registry.get("dermatology").unwrap();

        let execution = executor
            .execute(
                derm,
                &[
                    action("a", ActionKind::WebSearch, serde_json::json!({"query": "hives"})),
                    action("b", ActionKind::KnowledgeRetrieve, serde_json::json!({"query": "urticaria"})),
                    action("c", ActionKind::LogFinding, serde_json::json!({"report": "Acute urticaria"})),
                ],
            )
            .await;

        let ids: Vec<&str> = execution.results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(execution.results[0].1, "results for hives");
        assert_eq!(execution.results[1].1, "Dermatology says: urticaria");
        assert_eq!(execution.results[2].1, FINDING_ACK);
        assert_eq!(*knowledge.domains.lock().unwrap(), vec![KnowledgeDomain::Dermatology]);
    }

    #[tokio::test]
    async fn test_retrieval_failure_becomes_text() {
        let registry = RoleRegistry::builtin().unwrap();
        let knowledge = Arc::new(RecordingKnowledge {
            fail: true,
            ..Default::default()
        });
        let executor = ActionExecutor::new(Arc::new(EchoSearch), knowledge);
        let ent = registry.get("ent").unwrap();

        let execution = executor
            .execute(
                ent,
                &[action(
                    "k",
                    ActionKind::KnowledgeRetrieve,
                    serde_json::json!({"query": "otitis", "domain": "derma"}),
                )],
            )
            .await;

        assert!(execution.results[0].1.starts_with("Knowledge retrieval failed:"));
    }

    #[tokio::test]
    async fn test_disallowed_action_is_refused() {
        let registry = RoleRegistry::builtin().unwrap();
        let executor = ActionExecutor::new(Arc::new(EchoSearch), Arc::new(RecordingKnowledge::default()));
        let radiology = registry.get("radiology").unwrap();

        let execution = executor
            .execute(
                radiology,
                &[action("k", ActionKind::KnowledgeRetrieve, serde_json::json!({"query": "x-ray"}))],
            )
            .await;

        assert!(execution.results[0].1.contains("not available to Radiologist"));
    }

    #[tokio::test]
    async fn test_compile_case_sets_summary_for_intake() {
        let registry = RoleRegistry::builtin().unwrap();
        let executor = ActionExecutor::new(Arc::new(EchoSearch), Arc::new(RecordingKnowledge::default()));

        let execution = executor
            .execute(
                registry.intake(),
                &[action("c", ActionKind::CompileCase, serde_json::json!({"data": "Adult, rash 3 days"}))],
            )
            .await;

        assert_eq!(execution.case_summary.as_deref(), Some("Adult, rash 3 days"));
        assert_eq!(execution.results[0].1, CASE_ACK);

        // Specialists cannot write the case summary.
        let derm = registry.get("dermatology").unwrap();
        let refused = executor
            .execute(
                derm,
                &[action("c", ActionKind::CompileCase, serde_json::json!({"data": "overwrite"}))],
            )
            .await;
        assert!(refused.case_summary.is_none());
    }
}
