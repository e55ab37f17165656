//! Document ingestion, vector indexing and retrieval-augmented answering.
//!
//! Each embedding provider owns an independent index and upload directory.
//! [`DocumentManager`] is the entry point: it ingests PDFs, answers
//! questions, lists documents and deletes them while keeping the index and
//! the stored files consistent.

pub mod embeddings;
pub mod lifecycle;
pub mod loader;
pub mod provider;
pub mod rag;
pub mod registry;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider, MockProvider};
pub use lifecycle::{validate_filename, DocumentManager, ProviderSlot};
pub use loader::{DocumentLoader, PdfLoader};
pub use provider::{resolve, resolve_id, ProviderContext};
pub use rag::{RagAnswer, RagSourceRef};
pub use registry::{format_file_size, DocumentEntry, DocumentStatus};
pub use store::{DistanceMetric, EmbeddedBatch, IndexedChunk, VectorStore};
pub use types::{
    Chunk, ChunkMetadata, DeleteReport, DocumentKey, IngestReport, ProviderStatus, ScoredChunk,
};
