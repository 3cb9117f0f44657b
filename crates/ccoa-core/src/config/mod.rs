mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            bail!("retrieval.chunk_size must be greater than 0");
        }
        if r.chunk_overlap >= r.chunk_size {
            bail!(
                "retrieval.chunk_overlap ({}) must be less than retrieval.chunk_size ({})",
                r.chunk_overlap,
                r.chunk_size
            );
        }
        if r.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.vector_store.vector_size == Some(0) {
            bail!("vector_store.vector_size must be greater than 0");
        }

        let t = &self.timeouts;
        for (name, secs) in [
            ("clone_seconds", t.clone_seconds),
            ("llm_seconds", t.llm_seconds),
            ("embedding_seconds", t.embedding_seconds),
            ("store_seconds", t.store_seconds),
            ("web_search_seconds", t.web_search_seconds),
        ] {
            if secs == 0 {
                bail!("timeouts.{name} must be greater than 0");
            }
        }

        if self.llm.provider == ProviderKind::OpenAi && self.llm.openai.is_none() {
            bail!("llm.openai config section required for openai provider");
        }
        Ok(())
    }

    /// Resolve sensitive configuration values through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret("GOOGLE_API_KEY").await? {
            self.secrets.google_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("CCOA_OPENAI_API_KEY").await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("SERPAPI_API_KEY").await? {
            self.secrets.serpapi_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("CCOA_QDRANT_API_KEY").await? {
            self.secrets.qdrant_api_key = Some(Secret::new(val));
        }
        Ok(())
    }
}
