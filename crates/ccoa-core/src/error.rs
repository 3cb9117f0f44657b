use ccoa_llm::LlmError;
use ccoa_memory::MemoryError;

use crate::plan::PlanError;
use crate::repo::CloneError;

/// Failure of an onboarding or chat request, surfaced as one message.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("failed to clone repository: {0}")]
    Clone(#[source] CloneError),

    #[error("No supported files found in the repository.")]
    NoContent,

    #[error("embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector store error: {0}")]
    Storage(String),

    #[error("the AI returned a malformed onboarding plan: {0}")]
    MalformedPlan(#[from] PlanError),

    #[error("the request was blocked by safety settings: {reason}")]
    GenerationBlocked { reason: String },

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// Stable machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Clone(_) => "clone",
            Self::NoContent => "no_content",
            Self::Embedding(_) => "embedding",
            Self::Storage(_) => "storage",
            Self::MalformedPlan(_) => "malformed_plan",
            Self::GenerationBlocked { .. } => "generation_blocked",
            Self::Generation(_) => "generation",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::NoContent => 400,
            Self::Timeout { .. } => 504,
            _ => 500,
        }
    }
}

impl From<CloneError> for AssistantError {
    fn from(e: CloneError) -> Self {
        match e {
            CloneError::Timeout { seconds } => Self::Timeout {
                operation: "repository clone".into(),
                seconds,
            },
            other => Self::Clone(other),
        }
    }
}

impl From<LlmError> for AssistantError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Blocked { reason, .. } => Self::GenerationBlocked { reason },
            other => Self::Generation(other),
        }
    }
}

impl From<MemoryError> for AssistantError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Embedding(inner) => Self::Embedding(inner),
            MemoryError::Timeout { operation, seconds } => Self::Timeout {
                operation: operation.into(),
                seconds,
            },
            MemoryError::InvalidInput(msg) => Self::InvalidRequest(msg),
            MemoryError::Storage(inner) => Self::Storage(inner.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ccoa_memory::VectorStoreError;

    use super::*;

    #[test]
    fn kinds_and_statuses() {
        let cases: Vec<(AssistantError, &str, u16)> = vec![
            (AssistantError::InvalidRequest("x".into()), "invalid_request", 400),
            (AssistantError::NoContent, "no_content", 400),
            (
                AssistantError::Clone(CloneError::Failed {
                    status: "exit status: 128".into(),
                    stderr: "not found".into(),
                }),
                "clone",
                500,
            ),
            (AssistantError::Storage("down".into()), "storage", 500),
            (
                AssistantError::Timeout {
                    operation: "embedding".into(),
                    seconds: 30,
                },
                "timeout",
                504,
            ),
            (AssistantError::MalformedPlan(PlanError::Empty), "malformed_plan", 500),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn blocked_llm_error_maps_to_generation_blocked() {
        let err: AssistantError = LlmError::Blocked {
            provider: "gemini".into(),
            reason: "SAFETY".into(),
        }
        .into();
        assert_eq!(err.kind(), "generation_blocked");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn other_llm_error_maps_to_generation() {
        let err: AssistantError = LlmError::RateLimited.into();
        assert_eq!(err.kind(), "generation");
    }

    #[test]
    fn memory_errors_map_by_cause() {
        let embed: AssistantError = MemoryError::Embedding(LlmError::Other("boom".into())).into();
        assert_eq!(embed.kind(), "embedding");

        let storage: AssistantError =
            MemoryError::Storage(VectorStoreError::Search("unreachable".into())).into();
        assert_eq!(storage.kind(), "storage");
        assert!(storage.to_string().contains("unreachable"));

        let timeout: AssistantError = MemoryError::Timeout {
            operation: "search",
            seconds: 5,
        }
        .into();
        assert_eq!(timeout.kind(), "timeout");
        assert_eq!(timeout.to_string(), "search timed out after 5s");
    }

    #[test]
    fn clone_timeout_maps_to_timeout() {
        let err: AssistantError = CloneError::Timeout { seconds: 300 }.into();
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn no_content_message() {
        assert_eq!(
            AssistantError::NoContent.to_string(),
            "No supported files found in the repository."
        );
    }
}
