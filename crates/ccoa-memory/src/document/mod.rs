pub mod identity;
pub mod pipeline;
pub mod selector;
pub mod splitter;

pub use identity::{ChunkBatch, ChunkMetadata, chunk_id};
pub use pipeline::IngestionPipeline;
pub use selector::{SelectedFiles, SelectorConfig, SourceFile, select_files};
pub use splitter::{Chunk, SplitterConfig, TextSplitter};
