//! Request and response payloads of the onboarding and chat operations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardRequest {
    pub repo_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStep {
    pub step: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub files_to_review: Vec<String>,
    #[serde(default)]
    pub external_resources: Vec<ExternalResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterTask {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub suggested_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardResponse {
    pub learning_path: Vec<LearningStep>,
    pub starter_tasks: Vec<StarterTask>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub query: String,
}

/// Source chunk an answer was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub file_path: String,
    pub content_chunk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub provenance: Vec<Provenance>,
}
