//! Consult Core: transport-agnostic domain logic for the consultation
//! orchestrator.
//!
//! A panel of role agents (an intake physician, specialists and shared
//! pathology/radiology helpers) converses with a patient and produces one
//! consolidated report. This crate holds the session model, the role
//! registry, the decision-oracle and collaborator seams, the workflow engine
//! and its SQLite checkpoint store. It has **no HTTP framework dependency**
//! by default, making it suitable for use in:
//!
//! - HTTP servers (via `consult-server`)
//! - CLI tools (via `consult-cli`)
//!
//! # Feature Flags
//!
//! - `axum`: Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod collaborators;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod oracle;
pub mod roles;
pub mod state;
pub mod store;

// Convenience re-exports
pub use config::ConsultConfig;
pub use db::Database;
pub use engine::{Orchestrator, Run, StreamEvent};
pub use error::ServerError;
pub use state::{AppState, AppStateInner};
