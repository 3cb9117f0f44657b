use std::str::FromStr;

use super::Config;

/// Read and parse `key`, warning when the value is present but unparsable.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(v) = raw.trim().parse::<T>() {
        Some(v)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}

/// Parse a lowercase enum name through its serde representation.
fn env_enum<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(v) = serde_json::from_value(serde_json::Value::String(raw.to_lowercase())) {
        Some(v)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_retrieval();
        self.apply_env_overrides_runtime();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Some(kind) = env_enum("CCOA_LLM_PROVIDER") {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("CCOA_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("CCOA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CCOA_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(n) = env_parse("CCOA_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = n;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Some(backend) = env_enum("CCOA_VECTOR_STORE_BACKEND") {
            self.vector_store.backend = backend;
        }
        if let Ok(v) = std::env::var("CCOA_QDRANT_URL") {
            self.vector_store.qdrant_url = v;
        }
        if let Some(size) = env_parse("CCOA_VECTOR_SIZE") {
            self.vector_store.vector_size = Some(size);
        }
        if let Some(n) = env_parse("CCOA_UPSERT_BATCH_SIZE") {
            self.vector_store.upsert_batch_size = n;
        }
        if let Some(n) = env_parse("CCOA_CHUNK_SIZE") {
            self.retrieval.chunk_size = n;
        }
        if let Some(n) = env_parse("CCOA_CHUNK_OVERLAP") {
            self.retrieval.chunk_overlap = n;
        }
        if let Some(n) = env_parse("CCOA_TOP_K") {
            self.retrieval.top_k = n;
        }
        if let Some(n) = env_parse("CCOA_MAX_FILE_SIZE") {
            self.retrieval.max_file_size = n;
        }
    }

    fn apply_env_overrides_runtime(&mut self) {
        if let Ok(v) = std::env::var("CCOA_REPO_WORKDIR") {
            self.repo.workdir = Some(v.into());
        }
        if let Some(n) = env_parse("CCOA_CLONE_DEPTH") {
            self.repo.clone_depth = n;
        }
        if let Some(enabled) = env_parse("CCOA_TOOLS_WEB_SEARCH") {
            self.tools.web_search = enabled;
        }
        if let Some(n) = env_parse("CCOA_TOOLS_MAX_ITERATIONS") {
            self.tools.max_iterations = n;
        }
        if let Some(secs) = env_parse("CCOA_TIMEOUT_CLONE") {
            self.timeouts.clone_seconds = secs;
        }
        if let Some(secs) = env_parse("CCOA_TIMEOUT_LLM") {
            self.timeouts.llm_seconds = secs;
        }
        if let Some(secs) = env_parse("CCOA_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_seconds = secs;
        }
        if let Some(secs) = env_parse("CCOA_TIMEOUT_STORE") {
            self.timeouts.store_seconds = secs;
        }
        if let Some(secs) = env_parse("CCOA_TIMEOUT_WEB_SEARCH") {
            self.timeouts.web_search_seconds = secs;
        }
        if let Ok(v) = std::env::var("CCOA_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = env_parse("CCOA_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Some(limit) = env_parse("CCOA_GATEWAY_RATE_LIMIT") {
            self.gateway.rate_limit = limit;
        }
    }
}
