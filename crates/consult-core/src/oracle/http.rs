//! HTTP decision oracle: calls a chat-completions style LLM API directly.
//!
//! Two wire formats are supported:
//! - OpenAI-compatible `POST {base_url}/chat/completions` with function tools
//! - Anthropic `POST {base_url}/v1/messages` with `tool_use` blocks

use std::time::Duration;

use async_trait::async_trait;

use super::{Decision, DecisionOracle, DecisionRequest, OracleError};
use crate::models::{ActionKind, ActionRequest, Turn};

const CONTINUE_PROMPT: &str = "Continue.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleAdapter {
    OpenAi,
    Anthropic,
}

impl OracleAdapter {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "opencode" | "gemini" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Configuration for calling the LLM API.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub adapter: OracleAdapter,
    /// API base URL
    pub base_url: String,
    /// API key / auth token
    pub api_key: String,
    /// Model ID
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            adapter: OracleAdapter::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

pub struct HttpOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, OracleError> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body);

        request = match self.config.adapter {
            OracleAdapter::OpenAi => {
                request.header("Authorization", format!("Bearer {}", self.config.api_key))
            }
            OracleAdapter::Anthropic => request
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01"),
        };

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| OracleError::Permanent(format!("Failed to parse response JSON: {}", e)))
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, OracleError> {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.adapter {
            OracleAdapter::OpenAi => {
                let url = format!("{}/chat/completions", base);
                tracing::debug!(
                    "[Oracle] Calling OpenAI-compatible API: {} (model: {}, role: {})",
                    url,
                    self.config.model,
                    request.role_id
                );
                let json = self.post(&url, &openai_body(&self.config, request)).await?;
                parse_openai(&json)
            }
            OracleAdapter::Anthropic => {
                let url = format!("{}/v1/messages", base);
                tracing::debug!(
                    "[Oracle] Calling Anthropic API: {} (model: {}, role: {})",
                    url,
                    self.config.model,
                    request.role_id
                );
                let json = self.post(&url, &anthropic_body(&self.config, request)).await?;
                parse_anthropic(&json)
            }
        }
    }
}

/// 408/425/429 and 5xx are transient; every other failure status is permanent.
pub fn classify_status(status: u16, body: &str) -> OracleError {
    let message = format!("API returned {}: {}", status, body);
    match status {
        408 | 425 | 429 | 500..=599 => OracleError::Transient(message),
        _ => OracleError::Permanent(message),
    }
}

fn classify_transport(e: &reqwest::Error) -> OracleError {
    if e.is_timeout() || e.is_connect() {
        OracleError::Transient(format!("HTTP request failed: {}", e))
    } else {
        OracleError::Permanent(format!("HTTP request failed: {}", e))
    }
}

fn number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

// ─── OpenAI-compatible ────────────────────────────────────────────────────

fn openai_body(config: &OracleConfig, request: &DecisionRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": request.instructions,
    })];

    for turn in &request.transcript {
        match turn {
            Turn::User { text, .. } => {
                messages.push(serde_json::json!({ "role": "user", "content": text }));
            }
            Turn::Agent { text, actions, .. } => {
                let mut message = serde_json::json!({ "role": "assistant", "content": text });
                if !actions.is_empty() {
                    let calls: Vec<serde_json::Value> = actions
                        .iter()
                        .map(|a| {
                            serde_json::json!({
                                "id": a.id,
                                "type": "function",
                                "function": {
                                    "name": a.kind.as_str(),
                                    "arguments": a.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    message["tool_calls"] = serde_json::Value::Array(calls);
                }
                messages.push(message);
            }
            Turn::ActionResult { action_id, text, .. } => {
                messages.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": action_id,
                    "content": text,
                }));
            }
        }
    }

    if messages.last().and_then(|m| m.get("role")).and_then(|r| r.as_str()) == Some("assistant") {
        messages.push(serde_json::json!({ "role": "user", "content": CONTINUE_PROMPT }));
    }

    let mut body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
    });

    if !request.actions.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .actions
            .iter()
            .map(|k| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": k.as_str(),
                        "description": k.description(),
                        "parameters": k.parameters(),
                    }
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    if let Some(temp) = config.temperature {
        body["temperature"] = number(temp);
    }

    body
}

fn parse_openai(json: &serde_json::Value) -> Result<Decision, OracleError> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| OracleError::Permanent("Response has no choices[0].message".to_string()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let mut actions = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let function = call.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or("");
            let Some(kind) = ActionKind::from_str(name) else {
                tracing::warn!("[Oracle] Ignoring unknown tool call '{}'", name);
                continue;
            };
            let arguments = function
                .and_then(|f| f.get("arguments"))
                .map(|a| match a.as_str() {
                    Some(s) => serde_json::from_str(s).unwrap_or_else(|_| serde_json::json!({})),
                    None => a.clone(),
                })
                .unwrap_or_else(|| serde_json::json!({}));
            let id = call.get("id").and_then(|i| i.as_str()).unwrap_or("");
            actions.push(ActionRequest::with_id(id, kind, arguments));
        }
    }

    Ok(Decision { text, actions })
}

// ─── Anthropic ────────────────────────────────────────────────────────────

fn push_merged(messages: &mut Vec<serde_json::Value>, role: &str, blocks: Vec<serde_json::Value>) {
    if let Some(last) = messages.last_mut() {
        if last.get("role").and_then(|r| r.as_str()) == Some(role) {
            if let Some(content) = last.get_mut("content").and_then(|c| c.as_array_mut()) {
                content.extend(blocks);
                return;
            }
        }
    }
    messages.push(serde_json::json!({ "role": role, "content": blocks }));
}

fn anthropic_body(config: &OracleConfig, request: &DecisionRequest) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = Vec::new();

    for turn in &request.transcript {
        match turn {
            Turn::User { text, .. } => {
                push_merged(&mut messages, "user", vec![serde_json::json!({ "type": "text", "text": text })]);
            }
            Turn::Agent { text, actions, .. } => {
                let mut blocks = Vec::new();
                if !text.trim().is_empty() {
                    blocks.push(serde_json::json!({ "type": "text", "text": text }));
                }
                for a in actions {
                    let input = if a.arguments.is_object() {
                        a.arguments.clone()
                    } else {
                        serde_json::json!({})
                    };
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": a.id,
                        "name": a.kind.as_str(),
                        "input": input,
                    }));
                }
                if blocks.is_empty() {
                    blocks.push(serde_json::json!({ "type": "text", "text": "(no output)" }));
                }
                push_merged(&mut messages, "assistant", blocks);
            }
            Turn::ActionResult { action_id, text, .. } => {
                push_merged(
                    &mut messages,
                    "user",
                    vec![serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": action_id,
                        "content": text,
                    })],
                );
            }
        }
    }

    if messages.last().and_then(|m| m.get("role")).and_then(|r| r.as_str()) != Some("user") {
        push_merged(
            &mut messages,
            "user",
            vec![serde_json::json!({ "type": "text", "text": CONTINUE_PROMPT })],
        );
    }

    let mut body = serde_json::json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "system": request.instructions,
        "messages": messages,
    });

    if !request.actions.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .actions
            .iter()
            .map(|k| {
                serde_json::json!({
                    "name": k.as_str(),
                    "description": k.description(),
                    "input_schema": k.parameters(),
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    if let Some(temp) = config.temperature {
        body["temperature"] = number(temp);
    }

    body
}

fn parse_anthropic(json: &serde_json::Value) -> Result<Decision, OracleError> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| OracleError::Permanent("Response has no content array".to_string()))?;

    let mut texts = Vec::new();
    let mut actions = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                    texts.push(t.to_string());
                }
            }
            Some("tool_use") => {
                let name = block.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let Some(kind) = ActionKind::from_str(name) else {
                    tracing::warn!("[Oracle] Ignoring unknown tool_use '{}'", name);
                    continue;
                };
                let id = block.get("id").and_then(|i| i.as_str()).unwrap_or("");
                let input = block.get("input").cloned().unwrap_or_else(|| serde_json::json!({}));
                actions.push(ActionRequest::with_id(id, kind, input));
            }
            _ => {}
        }
    }

    Ok(Decision {
        text: texts.join("\n"),
        actions,
    })
}
