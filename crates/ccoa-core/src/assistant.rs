//! Retrieval orchestration behind the onboarding and chat operations.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ccoa_llm::LlmError;
use ccoa_llm::any::AnyProvider;
use ccoa_llm::provider::{
    ChatResponse as LlmResponse, LlmProvider, Message, MessagePart, Role, ToolDefinition,
    ToolUseRequest,
};
use ccoa_memory::document::IngestionPipeline;
use ccoa_memory::VectorStoreGateway;
use ccoa_tools::{ToolCall, ToolDef, ToolExecutor, WebSearchExecutor};

use crate::error::AssistantError;
use crate::plan::parse_plan;
use crate::prompts::{NO_MATCH_ANSWER, chat_prompt, format_context, onboarded_message, planning_prompt};
use crate::repo::{RepoFetcher, repo_structure};
use crate::session::{checkout_dir_name, collection_name, parse_repo_url};
use crate::types::{ChatResponse, OnboardResponse, Provenance};

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub top_k: usize,
    pub structure_limit: usize,
    /// Parent directory for temporary checkouts; system temp dir when `None`.
    pub workdir: Option<PathBuf>,
    pub llm_timeout: Duration,
    pub max_tool_iterations: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            structure_limit: 50,
            workdir: None,
            llm_timeout: Duration::from_secs(120),
            max_tool_iterations: 3,
        }
    }
}

/// Runs onboarding and chat requests. Holds no per-request state, so one
/// instance is shared across tasks behind an `Arc`.
pub struct Assistant {
    provider: AnyProvider,
    gateway: VectorStoreGateway,
    pipeline: IngestionPipeline,
    fetcher: Arc<dyn RepoFetcher>,
    web_search: Option<WebSearchExecutor>,
    settings: AssistantSettings,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("provider", &self.provider.name())
            .field("gateway", &self.gateway)
            .field("web_search", &self.web_search.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    #[must_use]
    pub fn new(
        provider: AnyProvider,
        gateway: VectorStoreGateway,
        pipeline: IngestionPipeline,
        fetcher: Arc<dyn RepoFetcher>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            provider,
            gateway,
            pipeline,
            fetcher,
            web_search: None,
            settings,
        }
    }

    #[must_use]
    pub fn with_web_search(mut self, executor: WebSearchExecutor) -> Self {
        self.web_search = Some(executor);
        self
    }

    #[must_use]
    pub fn gateway(&self) -> &VectorStoreGateway {
        &self.gateway
    }

    #[must_use]
    pub fn provider(&self) -> &AnyProvider {
        &self.provider
    }

    fn temp_workspace(&self) -> Result<tempfile::TempDir, AssistantError> {
        let dir = match &self.settings.workdir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("ccoa-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("ccoa-").tempdir()?,
        };
        Ok(dir)
    }

    /// Clone, index and plan a repository.
    ///
    /// The temporary checkout is removed before this returns, on success and
    /// on every error path.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError`] for an invalid URL, a failed clone, a
    /// repository without supported files, embedding or storage failures, and
    /// generation or plan parsing failures.
    pub async fn onboard(&self, repo_url: &str) -> Result<OnboardResponse, AssistantError> {
        let url = parse_repo_url(repo_url).map_err(AssistantError::InvalidRequest)?;
        let repo_url = repo_url.trim();
        let collection = collection_name(repo_url);

        let workspace = self.temp_workspace()?;
        let checkout = workspace.path().join(checkout_dir_name(&url));
        self.fetcher.fetch(&url, &checkout).await?;

        let pipeline = self.pipeline.clone();
        let limit = self.settings.structure_limit;
        let (batch, structure) = tokio::task::spawn_blocking(move || {
            (pipeline.collect(&checkout), repo_structure(&checkout, limit))
        })
        .await
        .map_err(|e| AssistantError::Io(std::io::Error::other(e)))?;

        if batch.is_empty() {
            tracing::warn!(repo = repo_url, "no supported files found");
            return Err(AssistantError::NoContent);
        }

        let handle = self.gateway.get_or_create_collection(&collection).await?;
        let written = self.pipeline.ingest(&self.gateway, &handle, &batch).await?;
        tracing::info!(
            repo = repo_url,
            collection = %collection,
            files = batch.file_count(),
            chunks = written,
            "repository indexed"
        );

        let raw = self
            .bounded_llm(
                "plan generation",
                self.provider
                    .chat_json(&[Message::user(planning_prompt(&structure))]),
            )
            .await?;
        let plan = parse_plan(&raw).inspect_err(|e| {
            tracing::error!(repo = repo_url, "failed to parse onboarding plan: {e}");
        })?;

        drop(workspace);
        tracing::debug!(repo = repo_url, "temporary checkout removed");

        Ok(OnboardResponse {
            learning_path: plan.learning_path,
            starter_tasks: plan.starter_tasks,
            message: onboarded_message(repo_url),
        })
    }

    /// Answer a question about an onboarded repository.
    ///
    /// An unknown `session_id` gets an empty collection and the no-match
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError`] for empty inputs, storage or embedding
    /// failures, and generation failures.
    pub async fn chat(&self, session_id: &str, query: &str) -> Result<ChatResponse, AssistantError> {
        if session_id.trim().is_empty() {
            return Err(AssistantError::InvalidRequest(
                "session_id must not be empty".into(),
            ));
        }
        if query.trim().is_empty() {
            return Err(AssistantError::InvalidRequest("query must not be empty".into()));
        }

        let handle = self.gateway.get_or_create_collection(session_id).await?;
        let hits = self.gateway.query(&handle, query, self.settings.top_k).await?;
        if hits.is_empty() {
            tracing::info!(session_id, "no matching chunks");
            return Ok(ChatResponse {
                answer: NO_MATCH_ANSWER.to_owned(),
                provenance: Vec::new(),
            });
        }
        tracing::debug!(session_id, hits = hits.len(), "retrieved context");

        let prompt = chat_prompt(&format_context(&hits), query);
        let answer = self.generate_answer(prompt).await?;

        let provenance = hits
            .iter()
            .map(|(doc, meta, _)| Provenance {
                file_path: meta.file_path.clone(),
                content_chunk: doc.to_owned(),
            })
            .collect();
        Ok(ChatResponse { answer, provenance })
    }

    async fn bounded_llm<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, LlmError>>,
    ) -> Result<T, AssistantError> {
        let timeout = self.settings.llm_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                tracing::error!("{operation} failed: {e}");
                AssistantError::from(e)
            }),
            Err(_) => Err(AssistantError::Timeout {
                operation: operation.to_owned(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    /// Plain completion, or a bounded tool loop when web search is available
    /// and the provider supports tool calls.
    async fn generate_answer(&self, prompt: String) -> Result<String, AssistantError> {
        let mut messages = vec![Message::user(prompt)];

        let Some(search) = self
            .web_search
            .as_ref()
            .filter(|_| self.provider.supports_tool_use())
        else {
            return self
                .bounded_llm("chat generation", self.provider.chat(&messages))
                .await;
        };

        let tools: Vec<ToolDefinition> = search
            .tool_definitions()
            .iter()
            .map(tool_def_to_definition)
            .collect();

        for iteration in 0..self.settings.max_tool_iterations {
            let response = self
                .bounded_llm(
                    "chat generation",
                    self.provider.chat_with_tools(&messages, &tools),
                )
                .await?;
            let (text, tool_calls) = match response {
                LlmResponse::Text(text) => return Ok(text),
                LlmResponse::ToolUse { text, tool_calls } => (text, tool_calls),
            };
            tracing::debug!(iteration, calls = tool_calls.len(), "model requested tools");

            let uses = tool_calls
                .iter()
                .map(|c| MessagePart::ToolUse {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    input: c.input.clone(),
                })
                .collect();
            messages.push(Message::new(Role::Assistant, text.unwrap_or_default()).with_parts(uses));

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                results.push(MessagePart::ToolResult {
                    tool_use_id: call.id.clone(),
                    name: call.name.clone(),
                    content: run_tool(search, call).await,
                });
            }
            messages.push(Message::user("").with_parts(results));
        }

        tracing::warn!(
            max_iterations = self.settings.max_tool_iterations,
            "tool iteration limit reached, requesting plain completion"
        );
        self.bounded_llm("chat generation", self.provider.chat(&messages))
            .await
    }
}

/// Tool failures are reported back to the model instead of failing the
/// request.
async fn run_tool(executor: &WebSearchExecutor, call: &ToolUseRequest) -> String {
    let tool_call = ToolCall {
        tool_id: call.name.clone(),
        params: call.input.clone(),
    };
    match executor.execute_tool_call(&tool_call).await {
        Ok(Some(output)) => output.summary,
        Ok(None) => format!("[error] unknown tool: {}", call.name),
        Err(e) => {
            tracing::warn!(tool = %call.name, "tool call failed: {e}");
            format!("[error] {e}")
        }
    }
}

fn tool_def_to_definition(def: &ToolDef) -> ToolDefinition {
    ToolDefinition {
        name: def.id.to_owned(),
        description: def.description.to_owned(),
        parameters: def.parameters(),
    }
}
