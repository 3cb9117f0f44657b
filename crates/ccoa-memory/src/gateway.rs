//! Single point of contact with the embedding model and the vector database.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ccoa_llm::provider::EmbedFn;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::document::identity::ChunkMetadata;
use crate::error::{MemoryError, Result};
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore};

/// Payload key holding the chunk text.
pub const PAYLOAD_DOCUMENT: &str = "document";
/// Payload key holding the composite `{file_path}_{chunk_index}` identifier.
pub const PAYLOAD_CHUNK_ID: &str = "chunk_id";
pub const PAYLOAD_FILE_PATH: &str = "file_path";
pub const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";

const PROBE_TEXT: &str = "dimension probe";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Fixed embedding dimension; probed from the model when `None`.
    pub vector_size: Option<u64>,
    pub upsert_batch_size: usize,
    pub embedding_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            vector_size: None,
            upsert_batch_size: 64,
            embedding_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to a collection known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    name: String,
}

impl CollectionHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Query hits reshaped into parallel sequences, best match first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub scores: Vec<f32>,
}

impl QueryResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate `(document, metadata, score)` in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(&self.metadatas)
            .zip(&self.scores)
            .map(|((doc, meta), score)| (doc.as_str(), meta, *score))
    }
}

pub struct VectorStoreGateway {
    store: Arc<dyn VectorStore>,
    embed_fn: EmbedFn,
    config: GatewayConfig,
    vector_size: OnceCell<u64>,
}

impl std::fmt::Debug for VectorStoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreGateway")
            .field("config", &self.config)
            .field("vector_size", &self.vector_size.get())
            .finish_non_exhaustive()
    }
}

impl VectorStoreGateway {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embed_fn: EmbedFn, config: GatewayConfig) -> Self {
        let vector_size = OnceCell::new_with(config.vector_size);
        Self {
            store,
            embed_fn,
            config,
            vector_size,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        bounded(
            "embedding",
            self.config.embedding_timeout,
            (self.embed_fn)(text),
        )
        .await
    }

    /// Embedding dimension, from configuration or a one-time probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe embedding fails or times out.
    pub async fn vector_size(&self) -> Result<u64> {
        self.vector_size
            .get_or_try_init(|| async {
                let probe = self.embed(PROBE_TEXT).await?;
                let size = u64::try_from(probe.len())?;
                tracing::info!(vector_size = size, "probed embedding dimension");
                Ok::<_, MemoryError>(size)
            })
            .await
            .copied()
    }

    /// Return a handle to `name`, creating the collection if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the store is unreachable, or the
    /// dimension probe fails.
    pub async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        if name.trim().is_empty() {
            return Err(MemoryError::InvalidInput(
                "collection name must not be empty".into(),
            ));
        }
        let exists = bounded(
            "collection lookup",
            self.config.store_timeout,
            self.store.collection_exists(name),
        )
        .await?;
        if !exists {
            let vector_size = self.vector_size().await?;
            let created = bounded(
                "collection creation",
                self.config.store_timeout,
                self.store.ensure_collection(name, vector_size),
            )
            .await;
            match created {
                Ok(()) => tracing::info!(collection = name, vector_size, "collection created"),
                Err(MemoryError::Storage(e)) => {
                    let exists = bounded(
                        "collection lookup",
                        self.config.store_timeout,
                        self.store.collection_exists(name),
                    )
                    .await?;
                    if !exists {
                        return Err(MemoryError::Storage(e));
                    }
                    tracing::debug!(collection = name, "collection created concurrently");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(CollectionHandle {
            name: name.to_owned(),
        })
    }

    /// Embed and write every item, overwriting existing ids.
    ///
    /// All items are attempted. Each failing item or batch is logged and the
    /// first error is returned once the rest have been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequences differ in length, or if any embedding
    /// or write fails.
    pub async fn upsert(
        &self,
        collection: &CollectionHandle,
        texts: &[String],
        metadatas: &[ChunkMetadata],
        ids: &[String],
    ) -> Result<usize> {
        if texts.len() != metadatas.len() || texts.len() != ids.len() {
            return Err(MemoryError::InvalidInput(format!(
                "parallel sequences differ in length: {} texts, {} metadatas, {} ids",
                texts.len(),
                metadatas.len(),
                ids.len()
            )));
        }

        let batch_size = self.config.upsert_batch_size.max(1);
        let mut first_error: Option<MemoryError> = None;
        let mut written = 0;

        for start in (0..texts.len()).step_by(batch_size) {
            let end = (start + batch_size).min(texts.len());
            let mut points = Vec::with_capacity(end - start);

            let items = texts[start..end]
                .iter()
                .zip(&metadatas[start..end])
                .zip(&ids[start..end]);
            for ((text, metadata), id) in items {
                match self.embed(text).await {
                    Ok(vector) => points.push(to_point(id, text, metadata, vector)),
                    Err(e) => {
                        tracing::warn!(id = %id, "failed to embed chunk: {e}");
                        first_error.get_or_insert(e);
                    }
                }
            }

            if points.is_empty() {
                continue;
            }
            let count = points.len();
            match bounded(
                "upsert",
                self.config.store_timeout,
                self.store.upsert(collection.name(), points),
            )
            .await
            {
                Ok(()) => written += count,
                Err(e) => {
                    tracing::warn!(
                        collection = collection.name(),
                        first_id = %ids[start],
                        count,
                        "failed to write batch: {e}"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            tracing::error!(
                collection = collection.name(),
                written,
                total = texts.len(),
                "upsert finished with failures"
            );
            return Err(e);
        }

        tracing::info!(collection = collection.name(), written, "upsert complete");
        Ok(written)
    }

    /// Return the `k` items most similar to `query_text`.
    ///
    /// An empty collection yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if the query embedding or the search fails.
    pub async fn query(
        &self,
        collection: &CollectionHandle,
        query_text: &str,
        k: usize,
    ) -> Result<QueryResult> {
        if k == 0 {
            return Ok(QueryResult::default());
        }
        let vector = self.embed(query_text).await?;
        let hits = bounded(
            "search",
            self.config.store_timeout,
            self.store.search(collection.name(), vector, u64::try_from(k)?),
        )
        .await?;

        let mut result = QueryResult::default();
        for hit in hits {
            let Some((id, document, metadata)) = from_payload(&hit) else {
                tracing::warn!(point = %hit.id, "skipping search hit with incomplete payload");
                continue;
            };
            result.ids.push(id);
            result.documents.push(document);
            result.metadatas.push(metadata);
            result.scores.push(hit.score);
        }
        tracing::debug!(
            collection = collection.name(),
            hits = result.len(),
            "query complete"
        );
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self, collection: &CollectionHandle) -> Result<u64> {
        bounded(
            "count",
            self.config.store_timeout,
            self.store.count(collection.name()),
        )
        .await
    }
}

async fn bounded<T, E>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    MemoryError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(MemoryError::from),
        Err(_) => Err(MemoryError::Timeout {
            operation,
            seconds: limit.as_secs(),
        }),
    }
}

/// Store point id: UUID v5 of the composite chunk id.
#[must_use]
pub fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn to_point(id: &str, text: &str, metadata: &ChunkMetadata, vector: Vec<f32>) -> VectorPoint {
    let payload = HashMap::from([
        (PAYLOAD_CHUNK_ID.to_owned(), serde_json::json!(id)),
        (PAYLOAD_DOCUMENT.to_owned(), serde_json::json!(text)),
        (
            PAYLOAD_FILE_PATH.to_owned(),
            serde_json::json!(metadata.file_path),
        ),
        (
            PAYLOAD_CHUNK_INDEX.to_owned(),
            serde_json::json!(metadata.chunk_index),
        ),
    ]);
    VectorPoint {
        id: point_id(id),
        vector,
        payload,
    }
}

fn from_payload(hit: &ScoredVectorPoint) -> Option<(String, String, ChunkMetadata)> {
    let document = hit.payload.get(PAYLOAD_DOCUMENT)?.as_str()?.to_owned();
    let file_path = hit.payload.get(PAYLOAD_FILE_PATH)?.as_str()?.to_owned();
    let chunk_index = usize::try_from(hit.payload.get(PAYLOAD_CHUNK_INDEX)?.as_u64()?).ok()?;
    let id = hit
        .payload
        .get(PAYLOAD_CHUNK_ID)
        .and_then(|v| v.as_str())
        .map_or_else(|| crate::document::chunk_id(&file_path, chunk_index), str::to_owned);
    Some((
        id,
        document,
        ChunkMetadata {
            file_path,
            chunk_index,
        },
    ))
}
