use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{ActionKind, ActionRequest};
use super::turn::Turn;

/// Helper families shared by every specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelperFamily {
    Pathology,
    Radiology,
}

impl HelperFamily {
    pub const ALL: [HelperFamily; 2] = [HelperFamily::Pathology, HelperFamily::Radiology];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pathology => "pathology",
            Self::Radiology => "radiology",
        }
    }

    pub fn stream(&self) -> StreamKey {
        match self {
            Self::Pathology => StreamKey::Pathology,
            Self::Radiology => StreamKey::Radiology,
        }
    }
}

/// Message stream families. Every specialist shares the specialist stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKey {
    Intake,
    Specialist,
    Pathology,
    Radiology,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Streams {
    intake: Vec<Turn>,
    specialist: Vec<Turn>,
    pathology: Vec<Turn>,
    radiology: Vec<Turn>,
}

impl Streams {
    fn get(&self, key: StreamKey) -> &Vec<Turn> {
        match key {
            StreamKey::Intake => &self.intake,
            StreamKey::Specialist => &self.specialist,
            StreamKey::Pathology => &self.pathology,
            StreamKey::Radiology => &self.radiology,
        }
    }

    fn get_mut(&mut self, key: StreamKey) -> &mut Vec<Turn> {
        match key {
            StreamKey::Intake => &mut self.intake,
            StreamKey::Specialist => &mut self.specialist,
            StreamKey::Pathology => &mut self.pathology,
            StreamKey::Radiology => &mut self.radiology,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct QnaLogs {
    pathology: Vec<String>,
    radiology: Vec<String>,
}

/// The consolidated result of a finished consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    /// Role that emitted the terminal phrase.
    pub role: String,
    /// The terminal turn's text (or the `finalize` report).
    pub narrative: String,
    /// Snapshot of the evidence log at termination.
    pub evidence: Vec<String>,
}

impl FinalReport {
    /// Evidence fragments separated by blank lines, followed by the narrative
    /// unless it was already logged as evidence.
    pub fn aggregated(&self) -> String {
        let narrative = self.narrative.trim();
        let mut parts: Vec<&str> = self.evidence.iter().map(|s| s.as_str()).collect();
        if !narrative.is_empty() && !self.evidence.iter().any(|e| e.trim() == narrative) {
            parts.push(narrative);
        }
        parts.join("\n\n")
    }
}

/// Scheduler state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SessionStatus {
    Running {
        role: String,
    },
    AwaitingInput {
        role: String,
        action_id: String,
        question: String,
    },
    Terminal {
        report: FinalReport,
    },
    Failed {
        error: String,
    },
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running { .. } => "running",
            Self::AwaitingInput { .. } => "awaiting-input",
            Self::Terminal { .. } => "terminal",
            Self::Failed { .. } => "failed",
        }
    }

    /// Terminal and failed sessions accept no further transitions.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Terminal { .. } | Self::Failed { .. })
    }
}

/// One consultation workflow instance.
///
/// Streams, QnA logs and the evidence log are append-only; the only
/// mutations exposed are appends, stack push/pop and status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub active_role: String,
    delegation_stack: Vec<String>,
    evidence_log: Vec<String>,
    streams: Streams,
    qna: QnaLogs,
    case_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(intake_role: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SessionStatus::Running {
                role: intake_role.to_string(),
            },
            active_role: intake_role.to_string(),
            delegation_stack: Vec::new(),
            evidence_log: Vec::new(),
            streams: Streams::default(),
            qna: QnaLogs::default(),
            case_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Make `role` the active role and mark the session running.
    pub fn activate(&mut self, role: &str) {
        self.active_role = role.to_string();
        self.status = SessionStatus::Running {
            role: role.to_string(),
        };
    }

    // ── Streams ─────────────────────────────────────────────────────────

    pub fn append(&mut self, key: StreamKey, turn: Turn) {
        self.streams.get_mut(key).push(turn);
    }

    pub fn stream(&self, key: StreamKey) -> &[Turn] {
        self.streams.get(key)
    }

    pub fn latest_agent_turn(&self, key: StreamKey) -> Option<&Turn> {
        self.stream(key).iter().rev().find(|t| t.is_agent())
    }

    fn resolved_ids(&self, key: StreamKey) -> HashSet<&str> {
        self.stream(key).iter().filter_map(|t| t.resolves()).collect()
    }

    /// Actions of the latest agent turn that have no result yet, in request order.
    pub fn unresolved_actions(&self, key: StreamKey) -> Vec<&ActionRequest> {
        let Some(turn) = self.latest_agent_turn(key) else {
            return Vec::new();
        };
        let resolved = self.resolved_ids(key);
        turn.actions()
            .iter()
            .filter(|a| !resolved.contains(a.id.as_str()))
            .collect()
    }

    /// Derived pending-question marker: the unresolved interactive question
    /// of the most recent agent turn that still has one.
    pub fn pending_question(&self, key: StreamKey) -> Option<&ActionRequest> {
        let resolved = self.resolved_ids(key);
        self.stream(key)
            .iter()
            .rev()
            .filter(|t| t.is_agent())
            .find_map(|t| {
                t.actions().iter().find(|a| {
                    a.kind == ActionKind::InteractiveQuestion && !resolved.contains(a.id.as_str())
                })
            })
    }

    /// Append a result for `action_id`. Returns false (and appends nothing)
    /// when the id is unknown to the stream or already resolved.
    pub fn resolve(&mut self, key: StreamKey, action_id: &str, text: impl Into<String>) -> bool {
        let known = self
            .stream(key)
            .iter()
            .any(|t| t.actions().iter().any(|a| a.id == action_id));
        if !known || self.resolved_ids(key).contains(action_id) {
            return false;
        }
        self.append(key, Turn::action_result(action_id, text));
        true
    }

    // ── Delegation stack ────────────────────────────────────────────────

    pub fn push_caller(&mut self, role: &str) {
        self.delegation_stack.push(role.to_string());
    }

    pub fn pop_caller(&mut self) -> Option<String> {
        self.delegation_stack.pop()
    }

    pub fn current_caller(&self) -> Option<&str> {
        self.delegation_stack.last().map(|s| s.as_str())
    }

    pub fn delegation_stack(&self) -> &[String] {
        &self.delegation_stack
    }

    // ── Evidence, QnA, case ─────────────────────────────────────────────

    pub fn record_finding(&mut self, finding: impl Into<String>) {
        self.evidence_log.push(finding.into());
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence_log
    }

    pub fn append_qna(&mut self, family: HelperFamily, entry: impl Into<String>) {
        match family {
            HelperFamily::Pathology => self.qna.pathology.push(entry.into()),
            HelperFamily::Radiology => self.qna.radiology.push(entry.into()),
        }
    }

    pub fn qna(&self, family: HelperFamily) -> &[String] {
        match family {
            HelperFamily::Pathology => &self.qna.pathology,
            HelperFamily::Radiology => &self.qna.radiology,
        }
    }

    pub fn case_summary(&self) -> Option<&str> {
        self.case_summary.as_deref()
    }

    /// Written only by the executor's `compile-case` handling.
    pub(crate) fn set_case_summary(&mut self, summary: String) {
        self.case_summary = Some(summary);
    }

    pub fn final_report(&self) -> Option<&FinalReport> {
        match &self.status {
            SessionStatus::Terminal { report } => Some(report),
            _ => None,
        }
    }

    /// Total number of turns across all streams.
    pub fn turn_count(&self) -> usize {
        [
            StreamKey::Intake,
            StreamKey::Specialist,
            StreamKey::Pathology,
            StreamKey::Radiology,
        ]
        .iter()
        .map(|k| self.stream(*k).len())
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> ActionRequest {
        ActionRequest::with_id(
            id,
            ActionKind::InteractiveQuestion,
            serde_json::json!({ "question": "How long?" }),
        )
    }

    #[test]
    fn test_pending_question_cleared_by_result() {
        let mut session = Session::new("intake");
        session.append(StreamKey::Intake, Turn::user("I have a rash"));
        session.append(StreamKey::Intake, Turn::agent("intake", "", vec![question("q1")]));

        assert_eq!(
            session.pending_question(StreamKey::Intake).map(|a| a.id.as_str()),
            Some("q1")
        );
        assert!(session.resolve(StreamKey::Intake, "q1", "3 days"));
        assert!(session.pending_question(StreamKey::Intake).is_none());
    }

    #[test]
    fn test_resolve_rejects_duplicates_and_unknown_ids() {
        let mut session = Session::new("intake");
        session.append(StreamKey::Intake, Turn::agent("intake", "", vec![question("q1")]));

        assert!(session.resolve(StreamKey::Intake, "q1", "yes"));
        assert!(!session.resolve(StreamKey::Intake, "q1", "yes again"));
        assert!(!session.resolve(StreamKey::Intake, "nope", "?"));
        assert_eq!(session.stream(StreamKey::Intake).len(), 2);
    }

    #[test]
    fn test_unresolved_actions_only_from_latest_agent_turn() {
        let mut session = Session::new("dermatology");
        let search = ActionRequest::with_id("s1", ActionKind::WebSearch, serde_json::json!({"query": "rash"}));
        let log = ActionRequest::with_id("l1", ActionKind::LogFinding, serde_json::json!({"report": "eczema"}));
        session.append(StreamKey::Specialist, Turn::agent("dermatology", "", vec![search]));
        session.append(StreamKey::Specialist, Turn::agent("dermatology", "", vec![log]));

        let pending: Vec<&str> = session
            .unresolved_actions(StreamKey::Specialist)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(pending, vec!["l1"]);
    }

    #[test]
    fn test_streams_are_isolated() {
        let mut session = Session::new("intake");
        session.append(StreamKey::Radiology, Turn::user("seed"));
        assert!(session.stream(StreamKey::Intake).is_empty());
        assert_eq!(session.stream(StreamKey::Radiology).len(), 1);
        assert_eq!(session.turn_count(), 1);
    }

    #[test]
    fn test_aggregated_report() {
        let report = FinalReport {
            role: "dermatology".into(),
            narrative: "Final Report: contact dermatitis".into(),
            evidence: vec!["X-ray normal".into(), "Contact dermatitis".into()],
        };
        assert_eq!(
            report.aggregated(),
            "X-ray normal\n\nContact dermatitis\n\nFinal Report: contact dermatitis"
        );

        let bare = FinalReport {
            role: "dermatology".into(),
            narrative: "Final Report: rest".into(),
            evidence: vec![],
        };
        assert_eq!(bare.aggregated(), "Final Report: rest");

        let logged = FinalReport {
            role: "dermatology".into(),
            narrative: "done".into(),
            evidence: vec!["done".into()],
        };
        assert_eq!(logged.aggregated(), "done");
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let status = SessionStatus::AwaitingInput {
            role: "intake".into(),
            action_id: "q1".into(),
            question: "Age?".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "awaiting-input");
        assert_eq!(json["actionId"], "q1");
    }

    #[test]
    fn test_session_roundtrips_through_json() {
        let mut session = Session::new("intake");
        session.append(StreamKey::Intake, Turn::user("hello"));
        session.push_caller("dermatology");
        session.append_qna(HelperFamily::Radiology, "Question from Dermatologist to Radiologist:");
        session.record_finding("itchy rash");
        session.set_case_summary("adult, rash".into());

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.current_caller(), Some("dermatology"));
        assert_eq!(restored.case_summary(), Some("adult, rash"));
    }
}
