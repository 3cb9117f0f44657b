//! Application bootstrap: config resolution, provider, vector store and
//! assistant construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use ccoa_llm::any::AnyProvider;
use ccoa_llm::gemini::{self, GeminiProvider};
use ccoa_llm::ollama::OllamaProvider;
use ccoa_llm::openai::OpenAiProvider;
use ccoa_llm::provider::LlmProvider;
use ccoa_memory::document::{IngestionPipeline, SelectorConfig, SplitterConfig, TextSplitter};
use ccoa_memory::{GatewayConfig, InMemoryVectorStore, QdrantOps, VectorStore, VectorStoreGateway};
use ccoa_tools::WebSearchExecutor;

use crate::assistant::{Assistant, AssistantSettings};
use crate::config::{Config, ProviderKind, VectorBackend};
use crate::repo::GitCloner;
use crate::vault::{EnvVaultProvider, VaultProvider};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Priority: `--config` argument, then `CCOA_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CCOA_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Load, validate and resolve secrets for the configuration at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, a setting is invalid, or
/// the vault fails.
pub async fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    config.validate()?;
    config.resolve_secrets(&EnvVaultProvider as &dyn VaultProvider).await?;
    Ok(config)
}

/// Build the configured LLM provider.
///
/// # Errors
///
/// Returns an error if the provider's API key or config section is missing.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Gemini => {
            let api_key = config
                .secrets
                .google_api_key
                .as_ref()
                .context("GOOGLE_API_KEY is required for the gemini provider")?;
            Ok(AnyProvider::Gemini(GeminiProvider::new(
                api_key.expose().to_owned(),
                llm.base_url
                    .clone()
                    .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_owned()),
                llm.model.clone(),
                Some(llm.embedding_model.clone()),
                llm.max_output_tokens,
            )))
        }
        ProviderKind::OpenAi => {
            let openai = llm
                .openai
                .as_ref()
                .context("llm.openai config section required for openai provider")?;
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("CCOA_OPENAI_API_KEY is required for the openai provider")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key.expose().to_owned(),
                openai.base_url.clone(),
                openai.model.clone(),
                openai.max_tokens,
                openai.embedding_model.clone(),
            )))
        }
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            llm.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
    }
}

/// Log whether the provider is reachable. Never fails startup.
pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e}"),
        }
    }
}

/// Build the configured vector store backend.
///
/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Qdrant => {
            let api_key = config.secrets.qdrant_api_key.as_ref().map(|s| s.expose());
            let ops = QdrantOps::new(&config.vector_store.qdrant_url, api_key)
                .context("failed to create Qdrant client")?;
            tracing::info!(url = %config.vector_store.qdrant_url, "using qdrant vector store");
            Ok(Arc::new(ops))
        }
        VectorBackend::Memory => {
            tracing::info!("using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}

#[must_use]
pub fn create_pipeline(config: &Config) -> IngestionPipeline {
    let selector = SelectorConfig {
        max_file_size: config.retrieval.max_file_size,
        ..SelectorConfig::default()
    };
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: config.retrieval.chunk_size,
        chunk_overlap: config.retrieval.chunk_overlap,
    });
    IngestionPipeline::new(selector, splitter)
}

/// Web search executor when enabled and a SerpApi key is available.
#[must_use]
pub fn create_web_search(config: &Config) -> Option<WebSearchExecutor> {
    if !config.tools.web_search {
        return None;
    }
    let Some(key) = config.secrets.serpapi_api_key.as_ref() else {
        tracing::info!("SERPAPI_API_KEY not set, web search disabled");
        return None;
    };
    Some(WebSearchExecutor::new(
        &config.tools,
        key.expose().to_owned(),
        Duration::from_secs(config.timeouts.web_search_seconds),
    ))
}

/// Wire provider, vector store, pipeline and tools into an [`Assistant`].
///
/// # Errors
///
/// Returns an error if any component cannot be created or the provider
/// cannot produce embeddings.
pub fn build_assistant(config: &Config, provider: AnyProvider) -> anyhow::Result<Assistant> {
    if !provider.supports_embeddings() {
        bail!(
            "provider {} has no embedding model configured",
            provider.name()
        );
    }

    let store = create_vector_store(config)?;
    let gateway = VectorStoreGateway::new(
        store,
        provider.embed_fn(),
        GatewayConfig {
            vector_size: config.vector_store.vector_size,
            upsert_batch_size: config.vector_store.upsert_batch_size,
            embedding_timeout: Duration::from_secs(config.timeouts.embedding_seconds),
            store_timeout: Duration::from_secs(config.timeouts.store_seconds),
        },
    );
    let fetcher = GitCloner::new(
        config.repo.clone_depth,
        Duration::from_secs(config.timeouts.clone_seconds),
    );
    let settings = AssistantSettings {
        top_k: config.retrieval.top_k,
        structure_limit: config.repo.structure_limit,
        workdir: config.repo.workdir.clone(),
        llm_timeout: Duration::from_secs(config.timeouts.llm_seconds),
        max_tool_iterations: config.tools.max_iterations,
    };

    let mut assistant = Assistant::new(
        provider,
        gateway,
        create_pipeline(config),
        Arc::new(fetcher),
        settings,
    );
    if let Some(search) = create_web_search(config) {
        tracing::info!("web search tool enabled");
        assistant = assistant.with_web_search(search);
    }
    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::config::OpenAiConfig;
    use crate::vault::Secret;

    fn gemini_config() -> Config {
        let mut config = Config::default();
        config.secrets.google_api_key = Some(Secret::new("g-key"));
        config.vector_store.backend = VectorBackend::Memory;
        config
    }

    #[test]
    fn cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/ccoa.toml")));
        assert_eq!(path, PathBuf::from("/etc/ccoa.toml"));
    }

    #[test]
    #[serial]
    fn env_path_then_default() {
        unsafe { std::env::set_var("CCOA_CONFIG", "/tmp/from-env.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/tmp/from-env.toml"));
        unsafe { std::env::remove_var("CCOA_CONFIG") };
        assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));
    }

    #[test]
    fn gemini_requires_api_key() {
        let err = create_provider(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn gemini_provider_from_config() {
        let provider = create_provider(&gemini_config()).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.supports_embeddings());
    }

    #[test]
    fn openai_requires_section_and_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        assert!(create_provider(&config).is_err());

        config.llm.openai = Some(OpenAiConfig {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            embedding_model: Some("text-embedding-3-small".into()),
        });
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("CCOA_OPENAI_API_KEY"));

        config.secrets.openai_api_key = Some(Secret::new("sk"));
        assert_eq!(create_provider(&config).unwrap().name(), "openai");
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Ollama;
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
    }

    #[test]
    fn web_search_needs_key_and_toggle() {
        let mut config = gemini_config();
        assert!(create_web_search(&config).is_none());
        config.secrets.serpapi_api_key = Some(Secret::new("s"));
        assert!(create_web_search(&config).is_some());
        config.tools.web_search = false;
        assert!(create_web_search(&config).is_none());
    }

    #[test]
    fn build_assistant_with_memory_backend() {
        let config = gemini_config();
        let provider = create_provider(&config).unwrap();
        assert!(build_assistant(&config, provider).is_ok());
    }

    #[test]
    fn build_assistant_rejects_provider_without_embeddings() {
        let mut config = gemini_config();
        config.llm.provider = ProviderKind::OpenAi;
        config.secrets.openai_api_key = Some(Secret::new("sk"));
        config.llm.openai = Some(OpenAiConfig {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            embedding_model: None,
        });
        let provider = create_provider(&config).unwrap();
        let err = build_assistant(&config, provider).unwrap_err();
        assert!(err.to_string().contains("embedding"));
    }

    #[test]
    fn pipeline_uses_retrieval_settings() {
        let mut config = Config::default();
        config.retrieval.chunk_size = 100;
        config.retrieval.chunk_overlap = 10;
        let pipeline = create_pipeline(&config);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "word ".repeat(100)).unwrap();
        let batch = pipeline.collect(dir.path());
        assert!(batch.len() >= 5);
        assert!(batch.texts.iter().all(|t| t.chars().count() <= 100));
    }
}
