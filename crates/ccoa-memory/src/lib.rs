//! Retrieval pipeline: file selection, chunking, embedding storage and similarity search.

pub mod document;
pub mod error;
pub mod gateway;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod vector_store;

pub use error::MemoryError;
pub use gateway::{CollectionHandle, GatewayConfig, QueryResult, VectorStoreGateway};
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
