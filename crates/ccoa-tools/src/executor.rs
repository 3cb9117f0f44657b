use std::fmt;

/// Structured tool invocation from the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_id: String,
    pub params: serde_json::Value,
}

/// Result of one tool invocation, fed back to the model verbatim.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool_name: String,
    pub summary: String,
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid tool parameters: {message}")]
    InvalidParams { message: String },

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("tool timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("failed to encode tool output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deserialize tool call params into a typed struct.
///
/// # Errors
///
/// Returns `ToolError::InvalidParams` when deserialization fails.
pub fn deserialize_params<T: serde::de::DeserializeOwned>(
    params: &serde_json::Value,
) -> Result<T, ToolError> {
    T::deserialize(params).map_err(|e| ToolError::InvalidParams {
        message: e.to_string(),
    })
}

/// Async trait for tool backends callable by the model.
pub trait ToolExecutor: Send + Sync {
    /// Tool definitions this executor can handle.
    fn tool_definitions(&self) -> Vec<crate::registry::ToolDef>;

    /// Execute a structured tool call. Returns `None` if `tool_id` is not handled.
    fn execute_tool_call(
        &self,
        call: &ToolCall,
    ) -> impl Future<Output = Result<Option<ToolOutput>, ToolError>> + Send;
}
