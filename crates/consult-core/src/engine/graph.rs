//! Workflow graph nodes.
//!
//! Every role contributes three nodes: its agent, its action executor and
//! its interactive gate. Suspension is a static property of the node kind.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNode {
    /// Invoke the role's decision oracle.
    Agent(String),
    /// Run the role's pending non-interactive actions.
    Tools(String),
    /// Wait for a human answer to the role's pending question.
    AskUser(String),
    /// Consultation finished.
    End,
}

impl GraphNode {
    /// The scheduler suspends before any interactive node and never
    /// dispatches it itself.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::AskUser(_))
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Agent(r) | Self::Tools(r) | Self::AskUser(r) => Some(r),
            Self::End => None,
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(r) => write!(f, "{}", r),
            Self::Tools(r) => write!(f, "{}:tools", r),
            Self::AskUser(r) => write!(f, "{}:ask-user", r),
            Self::End => f.write_str("end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ask_user_nodes_are_interactive() {
        assert!(GraphNode::AskUser("intake".into()).is_interactive());
        assert!(!GraphNode::Agent("intake".into()).is_interactive());
        assert!(!GraphNode::Tools("intake".into()).is_interactive());
        assert!(!GraphNode::End.is_interactive());
        assert_eq!(GraphNode::Tools("ent".into()).to_string(), "ent:tools");
        assert_eq!(GraphNode::End.role(), None);
    }
}
