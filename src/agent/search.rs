//! Web search tool backed by the Tavily REST API.

use crate::agent::Tool;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Web search via Tavily. Returns at most `max_results` hits.
#[derive(Clone)]
pub struct WebSearchTool {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl std::fmt::Debug for WebSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchTool")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl WebSearchTool {
    /// Create a search tool with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: 1,
        }
    }

    /// Override the API endpoint (used by tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information about a topic."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let query = args
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: query"))?;

        tracing::debug!(query = %query, "Running web search");

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = resp.json().await?;
        let results = body
            .get("results")
            .cloned()
            .unwrap_or(serde_json::Value::Array(vec![]));

        Ok(serde_json::json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requires_query() {
        let tool = WebSearchTool::new("key".to_string());
        let schema = tool.schema();
        assert_eq!(schema["required"][0], "query");
        assert_eq!(schema["properties"]["query"]["type"], "string");
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let tool = WebSearchTool::new("key".to_string());
        let err = tool.call(serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("query"));
    }
}
