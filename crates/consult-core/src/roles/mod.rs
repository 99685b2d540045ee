//! Role definitions: one parameterized definition per workflow role.
//!
//! Roles ship built in and can be overridden or extended from YAML files:
//!
//! ```yaml
//! id: "dermatology"
//! name: "Dermatologist"
//! kind: specialist
//! keywords: ["dermatology", "dermatologist"]
//! knowledge_domain: "Dermatology"
//! actions: [interactive-question, web-search, knowledge-retrieve, log-finding, delegate, finalize]
//! terminal_markers: ["final report:"]
//! system_prompt: |
//!   You are a High Quality Dermatologist.
//!   ...
//! ```

pub mod builtin;
pub mod registry;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collaborators::KnowledgeDomain;
use crate::models::{ActionKind, HelperFamily, StreamKey};

pub use registry::RoleRegistry;

#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("Failed to parse role YAML: {0}")]
    Parse(String),

    #[error("Failed to read roles: {0}")]
    Io(String),

    #[error("Invalid role registry: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Intake,
    Specialist,
    Helper,
}

/// A workflow role loaded from YAML or the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDef {
    /// Role ID (e.g., "intake", "dermatology", "radiology")
    pub id: String,

    /// Display name, also used in QnA markers ("Question from <name> ...")
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub kind: RoleKind,

    /// Helper family; required for helpers, ignored otherwise
    #[serde(default)]
    pub family: Option<HelperFamily>,

    /// Fixed role instructions
    pub system_prompt: String,

    /// Actions the role may request
    #[serde(default)]
    pub actions: Vec<ActionKind>,

    /// Phrases that select this role when named in another role's text
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Default domain for knowledge retrieval
    #[serde(default)]
    pub knowledge_domain: Option<KnowledgeDomain>,

    /// Initial user turn seeded into a helper's stream at session start
    #[serde(default)]
    pub seed_prompt: Option<String>,

    /// All markers must appear (case-insensitive) for a text to be terminal
    #[serde(default)]
    pub terminal_markers: Vec<String>,
}

impl RoleDef {
    /// Parse a role definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RoleError> {
        serde_yaml::from_str(yaml).map_err(|e| RoleError::Parse(e.to_string()))
    }

    /// Load a role definition from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, RoleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RoleError::Io(format!("'{}': {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn stream(&self) -> StreamKey {
        match (self.kind, self.family) {
            (RoleKind::Intake, _) => StreamKey::Intake,
            (RoleKind::Helper, Some(family)) => family.stream(),
            _ => StreamKey::Specialist,
        }
    }

    pub fn helper_family(&self) -> Option<HelperFamily> {
        match self.kind {
            RoleKind::Helper => self.family,
            _ => None,
        }
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        self.actions.contains(&kind)
    }

    /// True when the text carries every terminal marker of this role.
    pub fn is_terminal(&self, text: &str) -> bool {
        if self.terminal_markers.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.terminal_markers
            .iter()
            .all(|m| lower.contains(&m.to_lowercase()))
    }
}

/// Load all role definitions (`.yaml`/`.yml`) from a directory.
pub fn load_dir(dir: &str) -> Result<Vec<RoleDef>, RoleError> {
    let dir_path = Path::new(dir);
    if !dir_path.is_dir() {
        return Err(RoleError::Io(format!("Role directory '{}' does not exist", dir)));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir_path).map_err(|e| RoleError::Io(format!("'{}': {}", dir, e)))? {
        let entry = entry.map_err(|e| RoleError::Io(format!("Directory entry error: {}", e)))?;
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => paths.push(path),
            _ => continue,
        }
    }
    paths.sort();

    let mut roles = Vec::with_capacity(paths.len());
    for path in paths {
        let role = RoleDef::from_file(&path)?;
        tracing::info!("[RoleLoader] Loaded role: {} ({})", role.id, role.name);
        roles.push(role);
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_yaml() {
        let yaml = r#"
id: "cardiology"
name: "Cardiologist"
kind: specialist
keywords: ["cardiology", "cardiologist"]
actions: [interactive-question, web-search, log-finding, delegate, finalize]
terminal_markers: ["final report:"]
system_prompt: |
  You are a High Quality Cardiologist.
"#;
        let role = RoleDef::from_yaml(yaml).unwrap();
        assert_eq!(role.id, "cardiology");
        assert_eq!(role.kind, RoleKind::Specialist);
        assert_eq!(role.stream(), StreamKey::Specialist);
        assert!(role.allows(ActionKind::WebSearch));
        assert!(!role.allows(ActionKind::CompileCase));
        assert!(role.knowledge_domain.is_none());
    }

    #[test]
    fn test_helper_stream_follows_family() {
        let yaml = r#"
id: "radiology"
name: "Radiologist"
kind: helper
family: radiology
system_prompt: "Read images."
terminal_markers: ["final report", "specialist"]
"#;
        let role = RoleDef::from_yaml(yaml).unwrap();
        assert_eq!(role.helper_family(), Some(HelperFamily::Radiology));
        assert_eq!(role.stream(), StreamKey::Radiology);
        assert!(role.is_terminal("This is the Final Report to Specialist from Radiology labs: normal"));
        assert!(!role.is_terminal("final report pending"));
    }

    #[test]
    fn test_load_dir_reads_yaml_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "id: b\nname: B\nkind: specialist\nsystem_prompt: x\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "id: a\nname: A\nkind: specialist\nsystem_prompt: x\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let roles = load_dir(dir.path().to_str().unwrap()).unwrap();
        let ids: Vec<&str> = roles.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_load_dir_missing() {
        assert!(matches!(load_dir("/definitely/not/here"), Err(RoleError::Io(_))));
    }
}
