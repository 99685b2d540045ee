//! Consultation workflow engine.
//!
//! ```text
//! start(input) ─► Agent(intake) ─► route ─┬─► Tools(role) ─► route ─► ...
//!                                          ├─► AskUser(role)  (suspend, checkpoint)
//!                                          ├─► Agent(next role)
//!                                          └─► End            (final report)
//! resume(id, answer) ─► resolve pending question ─► route ─► ...
//! ```
//!
//! The session is checkpointed after every step. Each request drives its
//! session on a spawned task that holds the session lock until it stops.

pub mod events;
pub mod executor;
pub mod graph;
pub mod locks;
pub mod node;
pub mod retry;
pub mod router;

use std::sync::Arc;

use crate::error::ServerError;
use crate::models::{ActionRequest, FinalReport, HelperFamily, Session, SessionStatus, StreamKey, Turn};
use crate::oracle::DecisionOracle;
use crate::roles::builtin::DEFAULT_FALLBACK_ROLE;
use crate::roles::{RoleDef, RoleKind, RoleRegistry};
use crate::store::SessionStore;

pub use events::{EventSink, Run, StreamEvent};
pub use executor::{ActionExecutor, Execution};
pub use graph::GraphNode;
pub use locks::{SessionGuard, SessionLocks};
pub use node::AgentNode;
pub use retry::RetryPolicy;
pub use router::{route, ReturnVia, Route};

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Role a helper returns to when neither the stack nor the QnA log
    /// names a caller.
    pub fallback_role: String,
    /// Upper bound on steps per request; `None` is unbounded.
    pub max_steps: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_role: DEFAULT_FALLBACK_ROLE.to_string(),
            max_steps: None,
            retry: RetryPolicy::default(),
        }
    }
}

struct Inner {
    registry: Arc<RoleRegistry>,
    store: SessionStore,
    node: AgentNode,
    executor: ActionExecutor,
    locks: SessionLocks,
    max_steps: Option<usize>,
}

/// Workflow scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<RoleRegistry>,
        store: SessionStore,
        oracle: Arc<dyn DecisionOracle>,
        executor: ActionExecutor,
        config: &EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                node: AgentNode::new(oracle, config.retry.clone()),
                executor,
                locks: SessionLocks::new(),
                max_steps: config.max_steps,
            }),
        }
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.inner.locks
    }

    /// Create a session for `input` and start driving it from the intake role.
    pub async fn start(&self, input: &str) -> Result<Run, ServerError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ServerError::BadRequest("message must not be empty".to_string()));
        }

        let registry = &self.inner.registry;
        let intake = registry.intake();
        let mut session = Session::new(&intake.id);
        session.append(intake.stream(), Turn::user(input));
        session.append(StreamKey::Specialist, Turn::user(input));
        for family in HelperFamily::ALL {
            let helper = registry.helper(family);
            if let Some(seed) = &helper.seed_prompt {
                session.append(helper.stream(), Turn::user(seed.clone()));
            }
        }

        let guard = self
            .inner
            .locks
            .try_acquire(&session.id)
            .ok_or_else(|| ServerError::Conflict(format!("Session {} is busy", session.id)))?;
        self.inner.store.save(&session).await?;

        tracing::info!("[Orchestrator] Started session {}", session.id);

        let (sink, rx) = EventSink::channel(&session.id);
        sink.session();
        let session_id = session.id.clone();
        self.spawn_drive(session, GraphNode::Agent(intake.id.clone()), sink, guard);

        Ok(Run {
            session_id,
            events: rx,
        })
    }

    /// Answer the pending question of a suspended session and continue.
    pub async fn resume(&self, session_id: &str, answer: &str) -> Result<Run, ServerError> {
        if answer.trim().is_empty() {
            return Err(ServerError::BadRequest("answer must not be empty".to_string()));
        }

        let guard = self
            .inner
            .locks
            .try_acquire(session_id)
            .ok_or_else(|| ServerError::Conflict(format!("Session {} is busy", session_id)))?;

        let mut session = self
            .inner
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("Session {} not found", session_id)))?;

        let (role_id, action_id) = match &session.status {
            SessionStatus::AwaitingInput { role, action_id, .. } => (role.clone(), action_id.clone()),
            other => {
                return Err(ServerError::NoPendingQuestion(format!(
                    "Session {} is {}",
                    session_id,
                    other.as_str()
                )))
            }
        };

        let role = self.role(&role_id).map_err(ServerError::Internal)?;
        if !session.resolve(role.stream(), &action_id, answer.trim()) {
            return Err(ServerError::NoPendingQuestion(format!(
                "Question {} of session {} is already answered",
                action_id, session_id
            )));
        }
        session.activate(&role.id);

        let (mut sink, rx) = EventSink::channel(&session.id);
        sink.session();
        sink.message(&role.id, answer.trim());

        tracing::info!("[Orchestrator] Resuming session {} at {}", session_id, role.id);

        let next = match self.advance(&mut session, role, &mut sink) {
            Ok(next) => next,
            Err(error) => {
                self.fail(&mut session, &sink, error).await;
                return Ok(Run {
                    session_id: session_id.to_string(),
                    events: rx,
                });
            }
        };
        session.touch();
        self.inner.store.save(&session).await?;

        self.spawn_drive(session, next, sink, guard);

        Ok(Run {
            session_id: session_id.to_string(),
            events: rx,
        })
    }

    /// Delete a session unless a request is driving it.
    pub async fn delete(&self, session_id: &str) -> Result<bool, ServerError> {
        let _guard = self
            .inner
            .locks
            .try_acquire(session_id)
            .ok_or_else(|| ServerError::Conflict(format!("Session {} is busy", session_id)))?;
        self.inner.store.delete(session_id).await
    }

    fn spawn_drive(&self, session: Session, next: GraphNode, sink: EventSink, guard: SessionGuard) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut sink = sink;
            this.drive(session, next, &mut sink).await;
            // Release before the stream closes so a client that saw the
            // last event can resume immediately.
            drop(guard);
            drop(sink);
        });
    }

    fn role(&self, role_id: &str) -> Result<&RoleDef, String> {
        self.inner
            .registry
            .get(role_id)
            .ok_or_else(|| format!("Unknown role '{}'", role_id))
    }

    async fn drive(&self, mut session: Session, mut next: GraphNode, sink: &mut EventSink) {
        let mut steps = 0usize;
        loop {
            if next == GraphNode::End || session.status.is_finished() {
                return;
            }
            if next.is_interactive() {
                self.suspend(&mut session, &next, sink).await;
                return;
            }
            if let Some(limit) = self.inner.max_steps {
                if steps >= limit {
                    let error = format!("Step limit of {} exceeded", limit);
                    self.fail(&mut session, sink, error).await;
                    return;
                }
            }
            steps += 1;

            tracing::debug!("[Orchestrator] {} step {}: {}", session.id, steps, next);
            next = match self.step(&mut session, &next, sink).await {
                Ok(node) => node,
                Err(error) => {
                    self.fail(&mut session, sink, error).await;
                    return;
                }
            };

            session.touch();
            if let Err(e) = self.inner.store.save(&session).await {
                self.checkpoint_failed(&mut session, sink, e).await;
                return;
            }
        }
    }

    async fn step(
        &self,
        session: &mut Session,
        node: &GraphNode,
        sink: &mut EventSink,
    ) -> Result<GraphNode, String> {
        let role = self.role(node.role().unwrap_or_default())?;
        match node {
            GraphNode::Agent(_) => {
                let turn = self
                    .inner
                    .node
                    .run(&self.inner.registry, role, session)
                    .await
                    .map_err(|e| format!("{} failed: {}", role.name, e))?;
                sink.message(&role.id, turn.text());
                for action in turn.actions() {
                    sink.action(&role.id, action);
                }
                session.append(role.stream(), turn);
            }
            GraphNode::Tools(_) => {
                let pending: Vec<ActionRequest> = session
                    .unresolved_actions(role.stream())
                    .into_iter()
                    .cloned()
                    .collect();
                let execution = self.inner.executor.execute(role, &pending).await;
                if role.kind == RoleKind::Intake {
                    if let Some(summary) = execution.case_summary {
                        session.set_case_summary(summary);
                    }
                }
                for (action_id, text) in execution.results {
                    if session.resolve(role.stream(), &action_id, text.as_str()) {
                        sink.message(&role.id, &text);
                    }
                }
            }
            GraphNode::AskUser(_) | GraphNode::End => {
                return Err(format!("{} cannot be dispatched", node));
            }
        }
        self.advance(session, role, sink)
    }

    /// Route the role's latest turn and apply the resulting transition.
    fn advance(&self, session: &mut Session, role: &RoleDef, sink: &mut EventSink) -> Result<GraphNode, String> {
        let registry = &self.inner.registry;
        match route(registry, role, session) {
            Route::Gate { .. } => Ok(GraphNode::AskUser(role.id.clone())),
            Route::Execute { findings } => {
                for finding in findings {
                    session.record_finding(finding);
                }
                Ok(GraphNode::Tools(role.id.clone()))
            }
            Route::Continue => Ok(GraphNode::Agent(role.id.clone())),
            Route::Stay => {
                tracing::warn!(
                    "[Orchestrator] {}: {} produced no action and no routing phrase; asking again",
                    session.id,
                    role.id
                );
                Ok(GraphNode::Agent(role.id.clone()))
            }
            Route::Handoff { to, control_id } => {
                let target = self.role(&to)?;
                settle(session, sink, role, control_id, format!("Transferred to {}.", target.name));
                tracing::info!("[Orchestrator] {}: {} -> {} (handoff)", session.id, role.id, target.id);
                session.activate(&target.id);
                Ok(GraphNode::Agent(target.id.clone()))
            }
            Route::Delegate {
                helper,
                question,
                control_id,
            } => {
                let helper = self.role(&helper)?;
                let family = helper
                    .helper_family()
                    .ok_or_else(|| format!("'{}' is not a helper", helper.id))?;
                session.push_caller(&role.id);
                session.append_qna(
                    family,
                    format!("Question from {} to {}: {}", role.name, helper.name, question),
                );
                settle(session, sink, role, control_id, format!("Question sent to {}.", helper.name));
                tracing::info!(
                    "[Orchestrator] {}: {} -> {} (delegate, depth {})",
                    session.id,
                    role.id,
                    helper.id,
                    session.delegation_stack().len()
                );
                session.activate(&helper.id);
                Ok(GraphNode::Agent(helper.id.clone()))
            }
            Route::Return {
                to,
                answer,
                via,
                control_id,
            } => {
                let caller = self.role(&to)?;
                let family = role
                    .helper_family()
                    .ok_or_else(|| format!("'{}' is not a helper", role.id))?;
                session.append_qna(family, format!("{} answer report to specialist: {}", role.name, answer));
                match via {
                    ReturnVia::Stack => {
                        session.pop_caller();
                    }
                    ReturnVia::QnaScan | ReturnVia::Fallback => tracing::warn!(
                        "[Orchestrator] {}: delegation stack empty at {} return, resolved {} via {:?}",
                        session.id,
                        role.id,
                        caller.id,
                        via
                    ),
                }
                settle(session, sink, role, control_id, format!("Answer delivered to {}.", caller.name));
                tracing::info!("[Orchestrator] {}: {} -> {} (return)", session.id, role.id, caller.id);
                session.activate(&caller.id);
                Ok(GraphNode::Agent(caller.id.clone()))
            }
            Route::Finalize { narrative, control_id } => {
                settle(session, sink, role, control_id, "Consultation closed.".to_string());
                let report = FinalReport {
                    role: role.id.clone(),
                    narrative,
                    evidence: session.evidence().to_vec(),
                };
                sink.final_report(&role.id, &report.aggregated());
                tracing::info!(
                    "[Orchestrator] {}: finalized by {} ({} finding(s))",
                    session.id,
                    role.id,
                    report.evidence.len()
                );
                session.status = SessionStatus::Terminal { report };
                Ok(GraphNode::End)
            }
        }
    }

    async fn suspend(&self, session: &mut Session, node: &GraphNode, sink: &mut EventSink) {
        let gate = match self.role(node.role().unwrap_or_default()) {
            Ok(role) => match route(&self.inner.registry, role, session) {
                Route::Gate { action_id, question } => Ok((role.id.clone(), action_id, question)),
                other => Err(format!("{} has no pending question (route {:?})", role.id, other)),
            },
            Err(e) => Err(e),
        };
        let (role, action_id, question) = match gate {
            Ok(gate) => gate,
            Err(error) => {
                self.fail(session, sink, error).await;
                return;
            }
        };

        session.status = SessionStatus::AwaitingInput {
            role: role.clone(),
            action_id: action_id.clone(),
            question: question.clone(),
        };
        session.touch();
        if let Err(e) = self.inner.store.save(session).await {
            self.checkpoint_failed(session, sink, e).await;
            return;
        }
        tracing::info!("[Orchestrator] Session {} awaiting input", session.id);
        sink.awaiting_input(&role, &action_id, &question);
    }

    /// The stored checkpoint is now behind the in-memory session. Mark it
    /// failed and save once more so it is not left looking `running`.
    async fn checkpoint_failed(&self, session: &mut Session, sink: &EventSink, error: ServerError) {
        tracing::error!("[Orchestrator] Failed to checkpoint {}: {}", session.id, error);
        self.fail(session, sink, format!("Failed to checkpoint session: {}", error))
            .await;
    }

    async fn fail(&self, session: &mut Session, sink: &EventSink, error: String) {
        tracing::error!("[Orchestrator] Session {} failed: {}", session.id, error);
        sink.error(&error);
        session.status = SessionStatus::Failed { error };
        session.touch();
        if let Err(e) = self.inner.store.save(session).await {
            tracing::error!("[Orchestrator] Failed to checkpoint {}: {}", session.id, e);
        }
    }
}

/// Resolve a structured control action once its transition is applied.
fn settle(session: &mut Session, sink: &mut EventSink, role: &RoleDef, control_id: Option<String>, text: String) {
    if let Some(id) = control_id {
        if session.resolve(role.stream(), &id, text.as_str()) {
            sink.message(&role.id, &text);
        }
    }
}
