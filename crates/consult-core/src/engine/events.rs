//! Streaming events emitted while a session is driven.
//!
//! Transport-agnostic: the server maps each event to one SSE frame
//! (`event: <name>`, `data: <json>`), the CLI prints them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::models::ActionRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Session {
        session_id: String,
    },
    Message {
        session_id: String,
        role: String,
        text: String,
    },
    Action {
        session_id: String,
        id: String,
        kind: String,
        arguments: serde_json::Value,
        role: String,
    },
    AwaitingInput {
        session_id: String,
        role: String,
        action_id: String,
        question: String,
    },
    Final {
        session_id: String,
        role: String,
        report: String,
    },
    Error {
        session_id: String,
        message: String,
    },
}

impl StreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Message { .. } => "message",
            Self::Action { .. } => "action",
            Self::AwaitingInput { .. } => "awaiting-input",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }

    /// Payload without the `event` tag.
    pub fn data(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("event");
        }
        value
    }

    /// Whether the stream ends after this event.
    pub fn is_last(&self) -> bool {
        matches!(self, Self::AwaitingInput { .. } | Self::Final { .. } | Self::Error { .. })
    }
}

/// Sending half of one request's event stream. De-duplicates action events
/// by id; a dropped receiver is ignored so a disconnected client never
/// interrupts the drive.
pub struct EventSink {
    session_id: String,
    tx: mpsc::UnboundedSender<StreamEvent>,
    seen_actions: HashSet<String>,
}

impl EventSink {
    pub fn channel(session_id: &str) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                session_id: session_id.to_string(),
                tx,
                seen_actions: HashSet::new(),
            },
            rx,
        )
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    pub fn session(&self) {
        self.send(StreamEvent::Session {
            session_id: self.session_id.clone(),
        });
    }

    pub fn message(&self, role: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.send(StreamEvent::Message {
            session_id: self.session_id.clone(),
            role: role.to_string(),
            text: text.to_string(),
        });
    }

    pub fn action(&mut self, role: &str, action: &ActionRequest) {
        if !self.seen_actions.insert(action.id.clone()) {
            return;
        }
        self.send(StreamEvent::Action {
            session_id: self.session_id.clone(),
            id: action.id.clone(),
            kind: action.kind.as_str().to_string(),
            arguments: action.arguments.clone(),
            role: role.to_string(),
        });
    }

    pub fn awaiting_input(&self, role: &str, action_id: &str, question: &str) {
        self.send(StreamEvent::AwaitingInput {
            session_id: self.session_id.clone(),
            role: role.to_string(),
            action_id: action_id.to_string(),
            question: question.to_string(),
        });
    }

    pub fn final_report(&self, role: &str, report: &str) {
        self.send(StreamEvent::Final {
            session_id: self.session_id.clone(),
            role: role.to_string(),
            report: report.to_string(),
        });
    }

    pub fn error(&self, message: &str) {
        self.send(StreamEvent::Error {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }
}

/// Handle returned by start/resume: the session id plus its event stream.
/// The stream ends when the drive suspends, terminates or fails.
#[derive(Debug)]
pub struct Run {
    pub session_id: String,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl Run {
    /// Drain every event of this run.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<StreamEvent> {
        UnboundedReceiverStream::new(self.events)
    }
}
