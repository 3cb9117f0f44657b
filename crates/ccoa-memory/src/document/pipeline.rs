use std::path::Path;

use super::identity::ChunkBatch;
use super::selector::{SelectorConfig, select_files};
use super::splitter::TextSplitter;
use crate::error::MemoryError;
use crate::gateway::{CollectionHandle, VectorStoreGateway};

/// Selection → chunking → identity assignment over a checked-out tree, and the
/// hand-off of the resulting batch to the gateway.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    selector: SelectorConfig,
    splitter: TextSplitter,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(selector: SelectorConfig, splitter: TextSplitter) -> Self {
        Self { selector, splitter }
    }

    /// Walk `root` and build the parallel texts/metadatas/ids sequences.
    ///
    /// Blocking: reads every selected file from disk.
    #[must_use]
    pub fn collect(&self, root: &Path) -> ChunkBatch {
        let mut batch = ChunkBatch::default();
        let mut files = 0usize;
        for file in select_files(root, &self.selector) {
            files += 1;
            let chunks = self.splitter.split(&file.content);
            tracing::debug!(file = %file.path, chunks = chunks.len(), "chunked file");
            batch.push_file(&file.path, chunks);
        }
        tracing::info!(files, chunks = batch.len(), "collected repository chunks");
        batch
    }

    /// Write a collected batch through the gateway. Returns the number of
    /// chunks written.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails for any chunk.
    pub async fn ingest(
        &self,
        gateway: &VectorStoreGateway,
        collection: &CollectionHandle,
        batch: &ChunkBatch,
    ) -> Result<usize, MemoryError> {
        if batch.is_empty() {
            return Ok(0);
        }
        gateway
            .upsert(collection, &batch.texts, &batch.metadatas, &batch.ids)
            .await
    }
}
