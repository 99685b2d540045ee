use serde::{Deserialize, Serialize};

/// The kinds of side effect or control request an agent may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Ask the human a question. Never executed; suspends the session.
    InteractiveQuestion,
    WebSearch,
    KnowledgeRetrieve,
    /// Append a report fragment to the evidence log.
    LogFinding,
    /// Store the structured case summary (intake only).
    CompileCase,
    /// Hand control to another role: a specialist (from intake) or a helper.
    Delegate,
    /// Close the consultation (specialists) or answer the caller (helpers).
    Finalize,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::InteractiveQuestion,
        ActionKind::WebSearch,
        ActionKind::KnowledgeRetrieve,
        ActionKind::LogFinding,
        ActionKind::CompileCase,
        ActionKind::Delegate,
        ActionKind::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InteractiveQuestion => "interactive-question",
            Self::WebSearch => "web-search",
            Self::KnowledgeRetrieve => "knowledge-retrieve",
            Self::LogFinding => "log-finding",
            Self::CompileCase => "compile-case",
            Self::Delegate => "delegate",
            Self::Finalize => "finalize",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }

    /// Interactive actions are answered by a human, never by a collaborator.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::InteractiveQuestion)
    }

    /// Control actions move the session between roles and are applied by
    /// the scheduler rather than the executor.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Delegate | Self::Finalize)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::InteractiveQuestion => {
                "Ask the patient (or lab technician) exactly one question and wait for the answer."
            }
            Self::WebSearch => "Search the internet for medical information.",
            Self::KnowledgeRetrieve => {
                "Retrieve and synthesize knowledge from the curated medical library of a domain."
            }
            Self::LogFinding => "Add a finding to the patient's consolidated report.",
            Self::CompileCase => {
                "Store the compiled patient case summary before recommending a specialist."
            }
            Self::Delegate => {
                "Hand the consultation to another role (a specialist, or a Pathologist/Radiologist helper) with a question."
            }
            Self::Finalize => {
                "Finish your part: specialists deliver the final report, helpers answer the calling specialist."
            }
        }
    }

    /// JSON schema of the arguments, in the shape tool-calling APIs expect.
    pub fn parameters(&self) -> serde_json::Value {
        let (props, required): (serde_json::Value, Vec<&str>) = match self {
            Self::InteractiveQuestion => (
                serde_json::json!({ "question": { "type": "string", "description": "The single question to ask." } }),
                vec!["question"],
            ),
            Self::WebSearch => (
                serde_json::json!({ "query": { "type": "string" } }),
                vec!["query"],
            ),
            Self::KnowledgeRetrieve => (
                serde_json::json!({
                    "query": { "type": "string" },
                    "domain": {
                        "type": "string",
                        "description": "One of: Ophthalmology, Dermatology, ENT, Gynecology, Internal Medicine, Orthopedics, Pathology, Pediatrics, Psychiatry"
                    }
                }),
                vec!["query", "domain"],
            ),
            Self::LogFinding => (
                serde_json::json!({ "report": { "type": "string" } }),
                vec!["report"],
            ),
            Self::CompileCase => (
                serde_json::json!({ "data": { "type": "string", "description": "Demographics, key symptoms and relevant negatives." } }),
                vec!["data"],
            ),
            Self::Delegate => (
                serde_json::json!({
                    "target": { "type": "string", "description": "Role id or name, e.g. \"radiology\"." },
                    "question": { "type": "string" }
                }),
                vec!["target", "question"],
            ),
            Self::Finalize => (
                serde_json::json!({ "report": { "type": "string" } }),
                vec!["report"],
            ),
        };
        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required,
        })
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured request emitted by the decision oracle.
///
/// Owned by the agent turn that carries it and resolved exactly once by an
/// action-result turn with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub id: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, arguments: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            arguments,
        }
    }

    pub fn with_id(id: impl Into<String>, kind: ActionKind, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            arguments,
        }
    }

    /// String argument by name; empty strings count as missing.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accepts_tool_style_names() {
        assert_eq!(ActionKind::from_str("web_search"), Some(ActionKind::WebSearch));
        assert_eq!(
            ActionKind::from_str("Interactive-Question"),
            Some(ActionKind::InteractiveQuestion)
        );
        assert_eq!(ActionKind::from_str("ask_user"), None);
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ActionKind::KnowledgeRetrieve).unwrap();
        assert_eq!(json, "\"knowledge-retrieve\"");
    }

    #[test]
    fn test_arg_ignores_blank_values() {
        let action = ActionRequest::new(
            ActionKind::WebSearch,
            serde_json::json!({ "query": "  ", "other": 3 }),
        );
        assert_eq!(action.arg("query"), None);
        assert_eq!(action.arg("other"), None);
        assert_eq!(action.id.len(), 36);
    }
}
