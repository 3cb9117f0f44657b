use serde::Deserialize;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.into()
}

fn default_max_results() -> usize {
    5
}

fn default_max_iterations() -> usize {
    3
}

/// Web-search tool settings (`[tools]`).
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Offer `google_search` to the chat model. Ignored without an API key.
    #[serde(default = "default_true")]
    pub web_search: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Tool-call rounds served before a plain completion is forced.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: true,
            endpoint: default_endpoint(),
            max_results: default_max_results(),
            max_iterations: default_max_iterations(),
        }
    }
}
