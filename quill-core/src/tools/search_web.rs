//! Web search tool backed by the Tavily search API.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use llm::api::ToolDefinition;

pub const SEARCH_WEB: &str = "searchWeb";

const DESCRIPTION: &str = "Search the web for current information, news, facts, or topics requiring up-to-date data. Use this tool when recent or specific information is needed beyond training data. ALL search results MUST be included in the output, formatted clearly. IMPORTANT: give the all content of the web search including url and title and return the content in <t3-websearch> tag.";

pub const SEARCH_DISABLED_MESSAGE: &str = "Web search is disabled. Please try again later.";
pub const SEARCH_FAILED_MESSAGE: &str = "Failed to search the web. Please try again later.";

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchWebInput {
    /// The search query to find information about
    pub query: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// External search service contract
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<SearchResponse>;
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    max_results: u32,
    include_domains: Vec<String>,
    exclude_domains: Vec<String>,
}

pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.tavily.com")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        TavilyClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("TAVILY_API_KEY").ok().map(Self::new)
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str) -> anyhow::Result<SearchResponse> {
        let request = TavilyRequest {
            query,
            search_depth: "basic",
            include_answer: true,
            include_raw_content: false,
            max_results: 5,
            include_domains: vec![],
            exclude_domains: vec![],
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Tavily network error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => anyhow::anyhow!("Tavily authentication failed: Invalid API key"),
                429 => anyhow::anyhow!("Tavily rate limit exceeded: {}", detail),
                402 => anyhow::anyhow!("Tavily insufficient credits: {}", detail),
                code => anyhow::anyhow!("Tavily API error: {} {}", code, detail),
            });
        }

        Ok(response.json().await?)
    }
}

/// The `searchWeb` tool. Execution never fails at the orchestration level:
/// a disabled flag or an upstream failure comes back as a result payload
/// with an empty result list and an explanatory message.
pub struct SearchWebTool {
    enabled: bool,
    client: Arc<dyn SearchClient>,
}

impl SearchWebTool {
    pub fn new(enabled: bool, client: Arc<dyn SearchClient>) -> Self {
        SearchWebTool { enabled, client }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_WEB.to_string(),
            description: Some(DESCRIPTION.to_string()),
            input_schema: schemars::schema_for!(SearchWebInput),
        }
    }

    pub async fn execute(&self, args: Value) -> String {
        let query = match serde_json::from_value::<SearchWebInput>(args) {
            Ok(input) => input.query,
            Err(e) => {
                tracing::warn!("searchWeb called with invalid arguments: {}", e);
                String::new()
            }
        };

        if !self.enabled {
            return serde_json::json!({
                "query": query,
                "error": SEARCH_DISABLED_MESSAGE,
                "results": [],
            })
            .to_string();
        }

        match self.client.search(&query).await {
            Ok(response) => serde_json::json!({
                "results": response.results,
            })
            .to_string(),
            Err(e) => {
                tracing::error!("Search error: {:#}", e);
                serde_json::json!({
                    "query": query,
                    "error": SEARCH_FAILED_MESSAGE,
                    "results": [],
                })
                .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSearchClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchClient for CountingSearchClient {
        async fn search(&self, _query: &str) -> anyhow::Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResponse {
                results: vec![SearchResult {
                    title: "Rust".to_string(),
                    url: "https://www.rust-lang.org".to_string(),
                    content: "A language empowering everyone".to_string(),
                    score: 0.97,
                }],
            })
        }
    }

    struct FailingSearchClient;

    #[async_trait]
    impl SearchClient for FailingSearchClient {
        async fn search(&self, _query: &str) -> anyhow::Result<SearchResponse> {
            anyhow::bail!("Tavily rate limit exceeded: Too many requests")
        }
    }

    #[tokio::test]
    async fn test_disabled_search_makes_no_external_call() {
        let client = Arc::new(CountingSearchClient {
            calls: AtomicUsize::new(0),
        });
        let tool = SearchWebTool::new(false, client.clone());

        let payload = tool
            .execute(serde_json::json!({"query": "rust news"}))
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["error"], SEARCH_DISABLED_MESSAGE);
        assert_eq!(parsed["results"].as_array().unwrap().len(), 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enabled_search_maps_results() {
        let client = Arc::new(CountingSearchClient {
            calls: AtomicUsize::new(0),
        });
        let tool = SearchWebTool::new(true, client.clone());

        let payload = tool.execute(serde_json::json!({"query": "rust"})).await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        let results = parsed["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "Rust");
        assert_eq!(results[0]["url"], "https://www.rust-lang.org");
        assert!(results[0]["score"].as_f64().unwrap() > 0.9);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_captured_not_raised() {
        let tool = SearchWebTool::new(true, Arc::new(FailingSearchClient));

        let payload = tool.execute(serde_json::json!({"query": "rust"})).await;
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["error"], SEARCH_FAILED_MESSAGE);
        assert_eq!(parsed["results"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_definition_schema_has_query() {
        let def = SearchWebTool::definition();
        assert_eq!(def.name, SEARCH_WEB);
        let schema = serde_json::to_value(&def.input_schema).unwrap();
        assert!(schema["properties"]["query"].is_object());
    }
}
