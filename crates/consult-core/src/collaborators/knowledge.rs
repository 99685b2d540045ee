//! Knowledge retrieval: domain-scoped semantic search over curated material.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CollaboratorError;

/// Fixed set of knowledge domains the retrieval backend indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnowledgeDomain {
    Ophthalmology,
    Dermatology,
    #[serde(rename = "ENT")]
    Ent,
    Gynecology,
    #[serde(rename = "Internal Medicine")]
    InternalMedicine,
    Orthopedics,
    Pathology,
    Pediatrics,
    Psychiatry,
}

impl KnowledgeDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ophthalmology => "Ophthalmology",
            Self::Dermatology => "Dermatology",
            Self::Ent => "ENT",
            Self::Gynecology => "Gynecology",
            Self::InternalMedicine => "Internal Medicine",
            Self::Orthopedics => "Orthopedics",
            Self::Pathology => "Pathology",
            Self::Pediatrics => "Pediatrics",
            Self::Psychiatry => "Psychiatry",
        }
    }

    /// Normalize a loose hint ("dermatologist", "Opthal", "ear nose throat")
    /// to a domain.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let h = hint.trim().to_lowercase();
        if h.is_empty() {
            return None;
        }
        if h.contains("ophthal") || h.contains("opthal") || h.contains("eye") {
            Some(Self::Ophthalmology)
        } else if h.contains("derma") || h.contains("skin") {
            Some(Self::Dermatology)
        } else if h.contains("gynec") || h.contains("gynaec") {
            Some(Self::Gynecology)
        } else if h.contains("internal") {
            Some(Self::InternalMedicine)
        } else if h.contains("ortho") {
            Some(Self::Orthopedics)
        } else if h.contains("patho") {
            Some(Self::Pathology)
        } else if h.contains("pedia") || h.contains("paedia") {
            Some(Self::Pediatrics)
        } else if h.contains("psych") {
            Some(Self::Psychiatry)
        } else if h == "ent"
            || h.starts_with("ent ")
            || h.contains("otolaryn")
            || h.contains("ear")
        {
            Some(Self::Ent)
        } else {
            None
        }
    }
}

impl std::fmt::Display for KnowledgeDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    /// Return synthesized text answering `query` from the domain's material.
    async fn retrieve(&self, query: &str, domain: KnowledgeDomain) -> Result<String, CollaboratorError>;
}

/// Retrieval service reached over HTTP.
///
/// POST {endpoint} with `{"query": ..., "domain": ...}`; the response is
/// either `{"answer": "..."}` or plain text.
pub struct HttpKnowledgeBackend {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpKnowledgeBackend {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
        }
    }
}

#[async_trait]
impl KnowledgeBackend for HttpKnowledgeBackend {
    async fn retrieve(&self, query: &str, domain: KnowledgeDomain) -> Result<String, CollaboratorError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            CollaboratorError::NotConfigured("CONSULT_KNOWLEDGE_URL is not set".to_string())
        })?;

        tracing::debug!("[Knowledge] Retrieving from {} (domain: {})", endpoint, domain);

        let response = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "query": query, "domain": domain.as_str() }))
            .send()
            .await
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Response(e.to_string()))?;

        if !status.is_success() {
            return Err(CollaboratorError::Response(format!("{}: {}", status, body)));
        }

        Ok(extract_answer(&body))
    }
}

fn extract_answer(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json
            .get("answer")
            .and_then(|a| a.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hint_normalizes_roles_and_typos() {
        assert_eq!(KnowledgeDomain::from_hint("Ophthalmologist"), Some(KnowledgeDomain::Ophthalmology));
        assert_eq!(KnowledgeDomain::from_hint("opthalmology"), Some(KnowledgeDomain::Ophthalmology));
        assert_eq!(KnowledgeDomain::from_hint("Dermatologist"), Some(KnowledgeDomain::Dermatology));
        assert_eq!(KnowledgeDomain::from_hint("ENT"), Some(KnowledgeDomain::Ent));
        assert_eq!(KnowledgeDomain::from_hint("internal medicine"), Some(KnowledgeDomain::InternalMedicine));
        assert_eq!(KnowledgeDomain::from_hint("Orthopedist"), Some(KnowledgeDomain::Orthopedics));
        assert_eq!(KnowledgeDomain::from_hint("pathologist"), Some(KnowledgeDomain::Pathology));
        assert_eq!(KnowledgeDomain::from_hint("Pediatrician"), Some(KnowledgeDomain::Pediatrics));
        assert_eq!(KnowledgeDomain::from_hint("psychiatry"), Some(KnowledgeDomain::Psychiatry));
        assert_eq!(KnowledgeDomain::from_hint("cardiology"), None);
        assert_eq!(KnowledgeDomain::from_hint(""), None);
    }

    #[test]
    fn test_domain_serde_names() {
        assert_eq!(serde_json::to_string(&KnowledgeDomain::Ent).unwrap(), "\"ENT\"");
        let domain: KnowledgeDomain = serde_json::from_str("\"Internal Medicine\"").unwrap();
        assert_eq!(domain, KnowledgeDomain::InternalMedicine);
    }

    #[test]
    fn test_extract_answer() {
        assert_eq!(extract_answer(r#"{"answer": "Use emollients."}"#), "Use emollients.");
        assert_eq!(extract_answer("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_unconfigured_backend_errors() {
        let backend = HttpKnowledgeBackend::new(None);
        let err = backend.retrieve("rash", KnowledgeDomain::Dermatology).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }
}
