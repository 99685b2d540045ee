use std::collections::HashMap;

use regex::Regex;

use super::builtin::{builtin_roles, DEFAULT_FALLBACK_ROLE};
use super::{load_dir, RoleDef, RoleError, RoleKind};
use crate::models::HelperFamily;

/// Ordered role table, populated once at startup.
///
/// Registration order is routing order: the intake router picks the first
/// specialist whose keywords appear in its text.
pub struct RoleRegistry {
    roles: Vec<RoleDef>,
    index: HashMap<String, usize>,
    keyword_patterns: HashMap<String, Regex>,
    caller_patterns: HashMap<String, Regex>,
    intake: usize,
    helpers: HashMap<HelperFamily, usize>,
    fallback: usize,
}

impl RoleRegistry {
    /// Build a registry from definitions, validating the role graph.
    pub fn new(roles: Vec<RoleDef>, fallback_role: &str) -> Result<Self, RoleError> {
        let mut index = HashMap::new();
        for (i, role) in roles.iter().enumerate() {
            if index.insert(role.id.clone(), i).is_some() {
                return Err(RoleError::Invalid(format!("duplicate role id '{}'", role.id)));
            }
        }

        let intakes: Vec<usize> = (0..roles.len())
            .filter(|&i| roles[i].kind == RoleKind::Intake)
            .collect();
        let intake = match intakes.as_slice() {
            [only] => *only,
            _ => {
                return Err(RoleError::Invalid(format!(
                    "expected exactly one intake role, found {}",
                    intakes.len()
                )))
            }
        };

        let mut helpers = HashMap::new();
        for (i, role) in roles.iter().enumerate() {
            if role.kind != RoleKind::Helper {
                continue;
            }
            let family = role.family.ok_or_else(|| {
                RoleError::Invalid(format!("helper '{}' has no family", role.id))
            })?;
            if helpers.insert(family, i).is_some() {
                return Err(RoleError::Invalid(format!(
                    "more than one helper for family '{}'",
                    family.as_str()
                )));
            }
        }
        for family in HelperFamily::ALL {
            if !helpers.contains_key(&family) {
                return Err(RoleError::Invalid(format!(
                    "missing helper for family '{}'",
                    family.as_str()
                )));
            }
        }

        let fallback = *index
            .get(fallback_role)
            .ok_or_else(|| RoleError::Invalid(format!("unknown fallback role '{}'", fallback_role)))?;
        if roles[fallback].kind != RoleKind::Specialist {
            return Err(RoleError::Invalid(format!(
                "fallback role '{}' is not a specialist",
                fallback_role
            )));
        }

        let mut keyword_patterns = HashMap::new();
        let mut caller_patterns = HashMap::new();
        for role in &roles {
            if !role.keywords.is_empty() {
                keyword_patterns.insert(role.id.clone(), alternation(&role.keywords)?);
            }
            if role.kind == RoleKind::Specialist {
                let pattern = format!(
                    r"(?i)\bfrom\s+(?:{}|{})\b",
                    regex::escape(&role.name),
                    regex::escape(&role.id)
                );
                let re = Regex::new(&pattern).map_err(|e| RoleError::Invalid(e.to_string()))?;
                caller_patterns.insert(role.id.clone(), re);
            }
        }

        Ok(Self {
            roles,
            index,
            keyword_patterns,
            caller_patterns,
            intake,
            helpers,
            fallback,
        })
    }

    /// Built-in roles with the default fallback.
    pub fn builtin() -> Result<Self, RoleError> {
        Self::new(builtin_roles(), DEFAULT_FALLBACK_ROLE)
    }

    /// Built-in roles overridden (same id) or extended (new id) by the YAML
    /// files in `roles_dir`.
    pub fn load(roles_dir: Option<&str>, fallback_role: &str) -> Result<Self, RoleError> {
        let mut roles = builtin_roles();
        if let Some(dir) = roles_dir {
            for custom in load_dir(dir)? {
                match roles.iter().position(|r| r.id == custom.id) {
                    Some(pos) => roles[pos] = custom,
                    None => roles.push(custom),
                }
            }
        }
        Self::new(roles, fallback_role)
    }

    pub fn get(&self, id: &str) -> Option<&RoleDef> {
        self.index.get(id).map(|&i| &self.roles[i])
    }

    pub fn all(&self) -> &[RoleDef] {
        &self.roles
    }

    pub fn intake(&self) -> &RoleDef {
        &self.roles[self.intake]
    }

    pub fn helper(&self, family: HelperFamily) -> &RoleDef {
        &self.roles[self.helpers[&family]]
    }

    pub fn fallback_role(&self) -> &RoleDef {
        &self.roles[self.fallback]
    }

    pub fn specialists(&self) -> impl Iterator<Item = &RoleDef> {
        self.roles.iter().filter(|r| r.kind == RoleKind::Specialist)
    }

    fn helpers_in_order(&self) -> impl Iterator<Item = &RoleDef> {
        self.roles.iter().filter(|r| r.kind == RoleKind::Helper)
    }

    fn keyword_match(&self, role: &RoleDef, text: &str) -> bool {
        self.keyword_patterns
            .get(&role.id)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    /// First specialist (in registration order) named in `text`.
    pub fn match_specialist(&self, text: &str) -> Option<&RoleDef> {
        self.specialists().find(|r| self.keyword_match(r, text))
    }

    /// First helper named in `text`.
    pub fn match_helper(&self, text: &str) -> Option<&RoleDef> {
        self.helpers_in_order().find(|r| self.keyword_match(r, text))
    }

    /// Resolve a structured `delegate` target: id, name or family first,
    /// then keywords.
    pub fn resolve(&self, target: &str) -> Option<&RoleDef> {
        let wanted = target.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.roles
            .iter()
            .find(|r| {
                r.id.to_lowercase() == wanted
                    || r.name.to_lowercase() == wanted
                    || r.helper_family().map(|f| f.as_str() == wanted).unwrap_or(false)
            })
            .or_else(|| {
                self.roles
                    .iter()
                    .filter(|r| r.kind != RoleKind::Intake)
                    .find(|r| self.keyword_match(r, target))
            })
    }

    /// Most recent specialist named by a "from <role>" marker, scanning the
    /// entries newest first.
    pub fn caller_from_qna(&self, entries: &[String]) -> Option<&RoleDef> {
        entries.iter().rev().find_map(|entry| {
            self.specialists().find(|r| {
                self.caller_patterns
                    .get(&r.id)
                    .map(|re| re.is_match(entry))
                    .unwrap_or(false)
            })
        })
    }
}

fn alternation(keywords: &[String]) -> Result<Regex, RoleError> {
    let body = keywords
        .iter()
        .map(|k| regex::escape(k.trim()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", body)).map_err(|e| RoleError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::builtin::builtin_roles;

    #[test]
    fn test_match_specialist_uses_word_boundaries() {
        let registry = RoleRegistry::builtin().unwrap();
        assert_eq!(registry.match_specialist("Dermatologist").unwrap().id, "dermatology");
        assert_eq!(registry.match_specialist("ENT").unwrap().id, "ent");
        // "patient" and "treatment" must not select ENT
        assert!(registry.match_specialist("The patient needs treatment").is_none());
        assert_eq!(
            registry.match_specialist("refer to internal medicine please").unwrap().id,
            "internal-medicine"
        );
    }

    #[test]
    fn test_match_specialist_follows_registration_order() {
        let registry = RoleRegistry::builtin().unwrap();
        let role = registry
            .match_specialist("Pediatrician, or maybe an ophthalmologist")
            .unwrap();
        assert_eq!(role.id, "pediatrics");
    }

    #[test]
    fn test_match_helper() {
        let registry = RoleRegistry::builtin().unwrap();
        assert_eq!(
            registry.match_helper("I need imaging studies from Radiologist, chest X-ray").unwrap().id,
            "radiology"
        );
        assert_eq!(
            registry.match_helper("I need a blood report from Pathologist").unwrap().id,
            "pathology"
        );
        assert!(registry.match_helper("Final Report: rest").is_none());
    }

    #[test]
    fn test_resolve_targets() {
        let registry = RoleRegistry::builtin().unwrap();
        assert_eq!(registry.resolve("radiology").unwrap().id, "radiology");
        assert_eq!(registry.resolve("Radiologist").unwrap().id, "radiology");
        assert_eq!(registry.resolve("Dermatologist").unwrap().id, "dermatology");
        assert_eq!(registry.resolve("  INTERNAL-MEDICINE ").unwrap().id, "internal-medicine");
        assert!(registry.resolve("cardiology").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_caller_from_qna_prefers_latest_marker() {
        let registry = RoleRegistry::builtin().unwrap();
        let entries = vec![
            "Question from Orthopedist to Radiologist:".to_string(),
            "knee x-ray?".to_string(),
            "Question from Dermatologist to Radiologist:".to_string(),
            "rash imaging?".to_string(),
            "Radiologist answer report to specialist:".to_string(),
        ];
        assert_eq!(registry.caller_from_qna(&entries).unwrap().id, "dermatology");
        assert!(registry.caller_from_qna(&[]).is_none());
        assert!(registry
            .caller_from_qna(&["This is the final report to specialist from Radiology labs".to_string()])
            .is_none());
    }

    #[test]
    fn test_validation_rejects_bad_graphs() {
        let mut roles = builtin_roles();
        roles.retain(|r| r.id != "radiology");
        assert!(matches!(
            RoleRegistry::new(roles, "orthopedics"),
            Err(RoleError::Invalid(_))
        ));

        assert!(RoleRegistry::new(builtin_roles(), "radiology").is_err());
        assert!(RoleRegistry::new(builtin_roles(), "nobody").is_err());

        let mut dup = builtin_roles();
        dup.push(dup[1].clone());
        assert!(RoleRegistry::new(dup, "orthopedics").is_err());
    }

    #[test]
    fn test_load_overrides_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dermatology.yaml"),
            r#"
id: dermatology
name: Skin Doctor
kind: specialist
keywords: ["skin doctor"]
system_prompt: "custom"
terminal_markers: ["final report:"]
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("cardiology.yaml"),
            r#"
id: cardiology
name: Cardiologist
kind: specialist
keywords: ["cardiologist"]
system_prompt: "heart"
"#,
        )
        .unwrap();

        let registry =
            RoleRegistry::load(Some(dir.path().to_str().unwrap()), "cardiology").unwrap();
        assert_eq!(registry.get("dermatology").unwrap().name, "Skin Doctor");
        assert_eq!(registry.match_specialist("see the skin doctor").unwrap().id, "dermatology");
        assert_eq!(registry.fallback_role().id, "cardiology");
        assert_eq!(registry.all().last().unwrap().id, "cardiology");
    }
}
