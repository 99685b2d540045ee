//! Built-in role table: the general-physician intake, eight specialists,
//! and the pathology/radiology helpers shared by every specialist.

use crate::collaborators::KnowledgeDomain;
use crate::models::{ActionKind, HelperFamily};

use super::{RoleDef, RoleKind};

pub const INTAKE_ID: &str = "intake";
pub const DEFAULT_FALLBACK_ROLE: &str = "orthopedics";

const INTAKE_SYSTEM_PROMPT: &str = r#"You are a Medical Router AI / General Physician.

Your job is to assign the patient to the MOST APPROPRIATE specialist from:
Pediatrics, Ophthalmology, Orthopedist, Dermatology, ENT, Gynecology, Psychiatry, Internal Medicine.

Rules & Process:
1. ALWAYS use the `interactive-question` action to obtain patient information. Ask ONE question per action.
   Collect symptoms, duration, location, severity, age, name and relevant history.
   If the patient is a child, collect age, weight and height.
2. Only AFTER you have enough information, call `compile-case` with a concise structured summary
   (demographics + key symptoms + relevant negatives).
3. Once the case is compiled, output EXACTLY the specialist name and nothing else
   (or call `delegate` with the specialist as target).
4. Never prescribe medication; your role is purely triage. Never guess demographics.
5. Pathologist and Radiologist helpers are available to every specialist; do not assign them.
6. If you neither call an action nor name a specialist, you will simply be asked again."#;

const SPECIALIST_PROTOCOL: &str = r#"Your tasks:
1. Ask Questions: if more patient information is needed, use `interactive-question`. One question at a time.
2. Use Helpers: if you need a Pathologist or Radiologist, output plain text such as
   "I need a blood report from Pathologist, (your question)" or
   "I need imaging studies from Radiologist, (your question)",
   or call `delegate` with target "pathology" / "radiology". Their answers appear in the QnA context.
3. Use Knowledge Bases: prefer `knowledge-retrieve` over `web-search` for authoritative textbook knowledge.
   At most two reformulations when a query does not help.
4. Final Analysis & Reporting (VERY LAST ACTION):
   Step A: call `log-finding` once with your complete findings: diagnosis, treatment plan, follow-up.
   Step B: after it is confirmed, output the complete report starting with the exact phrase
   `Final Report:` (or call `finalize`). Do nothing after that.
Plain text that mentions neither a helper nor `Final Report:` is ignored."#;

const HELPER_PROTOCOL: &str = r#"Guidelines:
1. Frame your answer to the latest question from the specialist in the QnA context.
2. Use `interactive-question` to request reports from the patient or lab technician, one question at a time.
3. When your answer is ready:
   - call `log-finding` with your findings;
   - in the next turn, reply in plain text in this exact format:
     "This is the final report to specialist from {labs}: (your summary)"
     (or call `finalize` with the summary).
4. Any other plain text is ignored and you will be asked again."#;

fn specialist(
    id: &str,
    name: &str,
    focus: &str,
    keywords: &[&str],
    domain: KnowledgeDomain,
) -> RoleDef {
    RoleDef {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(focus.to_string()),
        kind: RoleKind::Specialist,
        family: None,
        system_prompt: format!(
            "You are a High Quality {}. Focus: {}\nWhen using `knowledge-retrieve`, pass domain \"{}\".\n\n{}",
            name, focus, domain, SPECIALIST_PROTOCOL
        ),
        actions: vec![
            ActionKind::InteractiveQuestion,
            ActionKind::WebSearch,
            ActionKind::KnowledgeRetrieve,
            ActionKind::LogFinding,
            ActionKind::Delegate,
            ActionKind::Finalize,
        ],
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        knowledge_domain: Some(domain),
        seed_prompt: None,
        terminal_markers: vec!["final report:".to_string()],
    }
}

fn helper(
    family: HelperFamily,
    name: &str,
    labs: &str,
    role_text: &str,
    keywords: &[&str],
    seed: &str,
    retrieval: bool,
) -> RoleDef {
    let mut actions = vec![
        ActionKind::InteractiveQuestion,
        ActionKind::WebSearch,
        ActionKind::LogFinding,
        ActionKind::Finalize,
    ];
    if retrieval {
        actions.insert(2, ActionKind::KnowledgeRetrieve);
    }
    RoleDef {
        id: family.as_str().to_string(),
        name: name.to_string(),
        description: Some(role_text.to_string()),
        kind: RoleKind::Helper,
        family: Some(family),
        system_prompt: format!(
            "You are a High Quality {}, a helper called in by a specialist. {}\n\n{}",
            name,
            role_text,
            HELPER_PROTOCOL.replace("{labs}", labs)
        ),
        actions,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        knowledge_domain: retrieval.then_some(KnowledgeDomain::Pathology),
        seed_prompt: Some(seed.to_string()),
        terminal_markers: vec!["final report".to_string(), "specialist".to_string()],
    }
}

/// Built-in roles in routing order: intake first, then specialists in the
/// order the intake router matches them, then the helpers.
pub fn builtin_roles() -> Vec<RoleDef> {
    vec![
        RoleDef {
            id: INTAKE_ID.to_string(),
            name: "General Physician".to_string(),
            description: Some("Triages the patient and recommends a specialist".to_string()),
            kind: RoleKind::Intake,
            family: None,
            system_prompt: INTAKE_SYSTEM_PROMPT.to_string(),
            actions: vec![
                ActionKind::InteractiveQuestion,
                ActionKind::CompileCase,
                ActionKind::Delegate,
            ],
            keywords: Vec::new(),
            knowledge_domain: None,
            seed_prompt: None,
            terminal_markers: Vec::new(),
        },
        specialist(
            "pediatrics",
            "Pediatrician",
            "Children and adolescents with general pediatric illnesses.",
            &["pediatrics", "pediatrician"],
            KnowledgeDomain::Pediatrics,
        ),
        specialist(
            "ophthalmology",
            "Ophthalmologist",
            "Eye problems: vision changes, redness, pain, floaters.",
            &["ophthalmology", "ophthalmologist"],
            KnowledgeDomain::Ophthalmology,
        ),
        specialist(
            "orthopedics",
            "Orthopedist",
            "Bone, joint, ligament, fracture or chronic musculoskeletal pain.",
            &["orthopedist", "orthopedics"],
            KnowledgeDomain::Orthopedics,
        ),
        specialist(
            "dermatology",
            "Dermatologist",
            "Skin rashes, lesions, acne, eczema, unusual pigmentation.",
            &["dermatology", "dermatologist"],
            KnowledgeDomain::Dermatology,
        ),
        specialist(
            "gynecology",
            "Gynecologist",
            "Female reproductive complaints; menstrual, pregnancy, hormonal issues.",
            &["gynecology", "gynecologist"],
            KnowledgeDomain::Gynecology,
        ),
        specialist(
            "psychiatry",
            "Psychiatrist",
            "Mental health, mood disorders, anxiety, depression, behavioral changes.",
            &["psychiatry", "psychiatrist"],
            KnowledgeDomain::Psychiatry,
        ),
        specialist(
            "internal-medicine",
            "Internal Medicine",
            "Adults with complex, chronic, multi-system or unclear systemic symptoms.",
            &["internal medicine", "internist"],
            KnowledgeDomain::InternalMedicine,
        ),
        specialist(
            "ent",
            "ENT",
            "Ear, nose and throat problems; hearing issues, sinusitis, sore throat.",
            &["ent", "otolaryngologist"],
            KnowledgeDomain::Ent,
        ),
        helper(
            HelperFamily::Pathology,
            "Pathologist",
            "Pathology labs",
            "Analyze lab reports. When asked to analyze a sample, first request the final lab report from the lab technician.",
            &["pathologist", "pathology lab"],
            "Generate some test based on status of Pathology status",
            true,
        ),
        helper(
            HelperFamily::Radiology,
            "Radiologist",
            "Radiology labs",
            "Analyze imaging studies (X-rays, CT scans, MRIs) requested by the specialist.",
            &["radiologist", "radiology lab"],
            "Generate some report based on status of Radiology status",
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roles() {
        let roles = builtin_roles();
        assert_eq!(roles.len(), 11);
        assert_eq!(roles[0].id, INTAKE_ID);
        assert_eq!(
            roles.iter().filter(|r| r.kind == RoleKind::Specialist).count(),
            8
        );
        assert!(roles.iter().any(|r| r.id == DEFAULT_FALLBACK_ROLE));
    }

    #[test]
    fn test_radiology_has_no_retrieval() {
        let roles = builtin_roles();
        let radiology = roles.iter().find(|r| r.id == "radiology").unwrap();
        let pathology = roles.iter().find(|r| r.id == "pathology").unwrap();
        assert!(!radiology.allows(ActionKind::KnowledgeRetrieve));
        assert!(pathology.allows(ActionKind::KnowledgeRetrieve));
        assert!(radiology.system_prompt.contains("from Radiology labs"));
    }
}
