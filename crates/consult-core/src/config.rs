//! Runtime configuration, read from the environment.

use std::path::PathBuf;

use crate::engine::{EngineConfig, RetryPolicy};
use crate::oracle::{OracleAdapter, OracleConfig};
use crate::roles::builtin::DEFAULT_FALLBACK_ROLE;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

#[derive(Debug, Clone, Default)]
pub struct ConsultConfig {
    pub oracle: OracleConfig,
    pub tavily_api_key: Option<String>,
    pub knowledge_url: Option<String>,
    /// Directory of YAML role overrides.
    pub roles_dir: Option<String>,
    pub engine: EngineConfig,
    /// Idle sessions (not running) older than this are evicted.
    pub session_ttl_secs: Option<u64>,
}

impl ConsultConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let adapter = get("CONSULT_ORACLE_ADAPTER")
            .and_then(|a| OracleAdapter::from_str(&a))
            .unwrap_or(OracleAdapter::OpenAi);

        let defaults = OracleConfig::default();
        let (default_url, default_model, key_fallback) = match adapter {
            OracleAdapter::OpenAi => (defaults.base_url.clone(), defaults.model.clone(), "OPENAI_API_KEY"),
            OracleAdapter::Anthropic => (
                ANTHROPIC_BASE_URL.to_string(),
                ANTHROPIC_DEFAULT_MODEL.to_string(),
                "ANTHROPIC_API_KEY",
            ),
        };

        let oracle = OracleConfig {
            adapter,
            base_url: get("CONSULT_ORACLE_BASE_URL").unwrap_or(default_url),
            api_key: get("CONSULT_ORACLE_API_KEY")
                .or_else(|| get(key_fallback))
                .unwrap_or_default(),
            model: get("CONSULT_ORACLE_MODEL").unwrap_or(default_model),
            ..defaults
        };

        let max_steps = get("CONSULT_MAX_STEPS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0);

        Self {
            oracle,
            tavily_api_key: get("TAVILY_API_KEY"),
            knowledge_url: get("CONSULT_KNOWLEDGE_URL"),
            roles_dir: get("CONSULT_ROLES_DIR"),
            engine: EngineConfig {
                fallback_role: get("CONSULT_FALLBACK_ROLE").unwrap_or_else(|| DEFAULT_FALLBACK_ROLE.to_string()),
                max_steps,
                retry: RetryPolicy::default(),
            },
            session_ttl_secs: get("CONSULT_SESSION_TTL_SECS").and_then(|v| v.parse().ok()),
        }
    }
}

/// `<data dir>/consult/consult.db`, or `consult.db` in the working
/// directory when the platform has no data dir.
pub fn default_db_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("consult").join("consult.db"))
        .unwrap_or_else(|| PathBuf::from("consult.db"))
        .to_string_lossy()
        .into_owned()
}
