//! Router: maps a role's latest agent turn to the next step.
//!
//! Pure: reads the turn and a read-only view of the session, mutates nothing.
//! Priority: interactive question, then other pending actions, then a lone
//! structured control action, then plain-text phrase matching.

use serde::Serialize;

use crate::models::{ActionKind, ActionRequest, Session};
use crate::roles::{RoleDef, RoleKind, RoleRegistry};

/// How a helper found the role to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnVia {
    /// Popped from the delegation stack.
    Stack,
    /// Stack was empty; recovered from the newest "from <role>" QnA marker.
    QnaScan,
    /// Nothing matched; the registry's fallback role.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Suspend on this interactive question.
    Gate { action_id: String, question: String },
    /// Run the pending actions; `findings` go to the evidence log first.
    Execute { findings: Vec<String> },
    /// The turn's actions are all settled; run the same role again.
    Continue,
    /// Intake transfers to a specialist. No stack push.
    Handoff { to: String, control_id: Option<String> },
    /// A specialist calls a helper. The caller is pushed.
    Delegate {
        helper: String,
        question: String,
        control_id: Option<String>,
    },
    /// A helper answers its caller.
    Return {
        to: String,
        answer: String,
        via: ReturnVia,
        control_id: Option<String>,
    },
    /// A specialist closes the consultation.
    Finalize {
        narrative: String,
        control_id: Option<String>,
    },
    /// Output matched no expected shape; the role runs again.
    Stay,
}

pub fn route(registry: &RoleRegistry, role: &RoleDef, session: &Session) -> Route {
    let key = role.stream();
    let Some(turn) = session.latest_agent_turn(key) else {
        return Route::Stay;
    };
    let pending = session.unresolved_actions(key);

    if let Some(question) = pending.iter().find(|a| is_gate(role, a)) {
        return Route::Gate {
            action_id: question.id.clone(),
            question: question.arg("question").unwrap_or_default().to_string(),
        };
    }

    let (control, other): (Vec<&ActionRequest>, Vec<&ActionRequest>) = pending
        .iter()
        .copied()
        .partition(|a| a.kind.is_control() && role.allows(a.kind));

    if !other.is_empty() || control.len() > 1 {
        return Route::Execute {
            findings: findings(role, &other),
        };
    }

    if let Some(action) = control.first() {
        return control_route(registry, role, session, action, turn.text());
    }

    if !turn.actions().is_empty() {
        return Route::Continue;
    }

    text_route(registry, role, session, turn.text())
}

fn is_gate(role: &RoleDef, action: &ActionRequest) -> bool {
    action.kind == ActionKind::InteractiveQuestion
        && role.allows(ActionKind::InteractiveQuestion)
        && action.arg("question").is_some()
}

fn findings(role: &RoleDef, actions: &[&ActionRequest]) -> Vec<String> {
    if !role.allows(ActionKind::LogFinding) {
        return Vec::new();
    }
    actions
        .iter()
        .filter(|a| a.kind == ActionKind::LogFinding)
        .filter_map(|a| a.arg("report"))
        .map(|s| s.to_string())
        .collect()
}

fn control_route(
    registry: &RoleRegistry,
    role: &RoleDef,
    session: &Session,
    action: &ActionRequest,
    turn_text: &str,
) -> Route {
    let control_id = Some(action.id.clone());
    match action.kind {
        ActionKind::Delegate => {
            let target = action.arg("target").and_then(|t| registry.resolve(t));
            let question = action.arg("question").unwrap_or(turn_text).to_string();
            match (role.kind, target) {
                (RoleKind::Intake, Some(t)) if t.kind == RoleKind::Specialist => Route::Handoff {
                    to: t.id.clone(),
                    control_id,
                },
                (RoleKind::Specialist, Some(t)) if t.kind == RoleKind::Helper => Route::Delegate {
                    helper: t.id.clone(),
                    question,
                    control_id,
                },
                _ => Route::Execute { findings: Vec::new() },
            }
        }
        ActionKind::Finalize => {
            let report = action.arg("report").unwrap_or(turn_text).to_string();
            match role.kind {
                RoleKind::Specialist => Route::Finalize {
                    narrative: report,
                    control_id,
                },
                RoleKind::Helper => {
                    let (to, via) = resolve_return(registry, role, session);
                    Route::Return {
                        to,
                        answer: report,
                        via,
                        control_id,
                    }
                }
                RoleKind::Intake => Route::Execute { findings: Vec::new() },
            }
        }
        _ => Route::Execute { findings: Vec::new() },
    }
}

fn text_route(registry: &RoleRegistry, role: &RoleDef, session: &Session, text: &str) -> Route {
    match role.kind {
        RoleKind::Intake => match registry.match_specialist(text) {
            Some(specialist) => Route::Handoff {
                to: specialist.id.clone(),
                control_id: None,
            },
            None => Route::Stay,
        },
        // The terminal phrase wins over helper names: a final report that
        // cites the radiologist must not re-delegate.
        RoleKind::Specialist => {
            if role.is_terminal(text) {
                Route::Finalize {
                    narrative: text.to_string(),
                    control_id: None,
                }
            } else if let Some(helper) = registry.match_helper(text) {
                Route::Delegate {
                    helper: helper.id.clone(),
                    question: text.to_string(),
                    control_id: None,
                }
            } else {
                Route::Stay
            }
        }
        RoleKind::Helper => {
            if role.is_terminal(text) {
                let (to, via) = resolve_return(registry, role, session);
                Route::Return {
                    to,
                    answer: text.to_string(),
                    via,
                    control_id: None,
                }
            } else {
                Route::Stay
            }
        }
    }
}

/// Caller to return to: stack top, else the newest QnA marker, else the
/// configured fallback role.
pub fn resolve_return(registry: &RoleRegistry, helper: &RoleDef, session: &Session) -> (String, ReturnVia) {
    if let Some(caller) = session.current_caller().and_then(|c| registry.get(c)) {
        return (caller.id.clone(), ReturnVia::Stack);
    }
    if let Some(family) = helper.helper_family() {
        if let Some(caller) = registry.caller_from_qna(session.qna(family)) {
            return (caller.id.clone(), ReturnVia::QnaScan);
        }
    }
    (registry.fallback_role().id.clone(), ReturnVia::Fallback)
}
