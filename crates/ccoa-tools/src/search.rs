use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ToolsConfig;
use crate::executor::{ToolCall, ToolError, ToolExecutor, ToolOutput, deserialize_params};
use crate::registry::ToolDef;

pub const TOOL_ID: &str = "google_search";

const TOOL_DESCRIPTION: &str = "Get information from Google Search. Use this to find external \
     resources, tutorials, documentation, and up-to-date information.";

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchInstruction {
    /// The search query.
    query: String,
}

/// One simplified organic result as handed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<SearchHit>,
    error: Option<String>,
}

/// Google search through SerpApi (`engine=google`).
pub struct WebSearchExecutor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
    timeout: Duration,
}

impl std::fmt::Debug for WebSearchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchExecutor")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl WebSearchExecutor {
    #[must_use]
    pub fn new(config: &ToolsConfig, api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ccoa/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            max_results: config.max_results,
            timeout,
        }
    }

    /// Run one query and return the top organic results.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, an error
    /// reported in the response body, or when the call exceeds the timeout.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        tracing::debug!(query, "web search");
        tokio::time::timeout(self.timeout, self.fetch(query))
            .await
            .map_err(|_| ToolError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("engine", "google"), ("q", query), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "search service error: {message}");
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        if let Some(message) = body.error {
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let mut hits = body.organic_results;
        hits.truncate(self.max_results);
        Ok(hits)
    }
}

impl ToolExecutor for WebSearchExecutor {
    fn tool_definitions(&self) -> Vec<ToolDef> {
        vec![ToolDef {
            id: TOOL_ID,
            description: TOOL_DESCRIPTION,
            schema: schemars::schema_for!(SearchInstruction),
        }]
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> Result<Option<ToolOutput>, ToolError> {
        if call.tool_id != TOOL_ID {
            return Ok(None);
        }
        let instruction: SearchInstruction = deserialize_params(&call.params)?;
        if instruction.query.trim().is_empty() {
            return Err(ToolError::InvalidParams {
                message: "query must not be empty".into(),
            });
        }

        let hits = self.search(&instruction.query).await?;
        tracing::info!(results = hits.len(), "web search completed");

        Ok(Some(ToolOutput {
            tool_name: TOOL_ID.to_owned(),
            summary: serde_json::to_string(&hits)?,
        }))
    }
}
