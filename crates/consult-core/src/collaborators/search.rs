//! Web search. Failures are reported in the returned text, never raised.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Search the web. Fails open: errors come back as `"Search failed: ..."`.
    async fn search(&self, query: &str) -> String;
}

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Tavily search API client (max 5 results, basic depth).
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
}

impl TavilySearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            url: TAVILY_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (self-hosted proxy, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn try_search(&self, query: &str) -> Result<String, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "TAVILY_API_KEY is not set".to_string())?;

        let body = serde_json::json!({
            "query": query,
            "max_results": 5,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("{}: {}", status, text));
        }

        Ok(format_results(&text))
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    async fn search(&self, query: &str) -> String {
        match self.try_search(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("[Search] Query '{}' failed: {}", query, e);
                format!("Search failed: {}", e)
            }
        }
    }
}

fn format_results(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => {
            let results = json.get("results").cloned().unwrap_or(json);
            serde_json::to_string_pretty(&results).unwrap_or_else(|_| body.to_string())
        }
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_open() {
        let search = TavilySearch::new(None);
        let text = search.search("eczema treatment").await;
        assert!(text.starts_with("Search failed:"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_open() {
        let search = TavilySearch::new(Some("key".into())).with_url("http://127.0.0.1:9/search");
        let text = search.search("eczema").await;
        assert!(text.starts_with("Search failed:"));
    }

    #[test]
    fn test_format_results_prefers_results_array() {
        let body = r#"{"query": "q", "results": [{"title": "A", "url": "u", "content": "c"}]}"#;
        let formatted = format_results(body);
        assert!(formatted.contains("\"title\": \"A\""));
        assert!(!formatted.contains("\"query\""));
    }
}
