//! Configuration, repository ingestion and the onboarding/chat assistant.

pub mod assistant;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod plan;
pub mod prompts;
pub mod repo;
pub mod session;
pub mod types;
pub mod vault;

pub use assistant::{Assistant, AssistantSettings};
pub use error::AssistantError;
