//! Tools the chat model may call while answering a question.

pub mod config;
pub mod executor;
pub mod registry;
pub mod search;

pub use config::ToolsConfig;
pub use executor::{ToolCall, ToolError, ToolExecutor, ToolOutput};
pub use registry::ToolDef;
pub use search::WebSearchExecutor;
