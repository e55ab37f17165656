//! Document and index type definitions.

use docrag_core::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity and position metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name of the source document (no directory component)
    pub source: String,

    /// Modification time of the stored file when it was ingested
    pub uploaded_at: String,

    /// Byte offset of the chunk inside the extracted document text
    pub start_index: usize,

    /// Loader-specific fields, stored inline next to the identity fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, uploaded_at: impl Into<String>, start_index: usize) -> Self {
        Self {
            source: source.into(),
            uploaded_at: uploaded_at.into(),
            start_index,
            extra: serde_json::Map::new(),
        }
    }

    /// Whether this chunk belongs to the document generation `(source, uploaded_at)`.
    pub fn matches(&self, source: &str, uploaded_at: &str) -> bool {
        self.source == source && self.uploaded_at == uploaded_at
    }
}

/// A contiguous slice of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Cosine similarity in [-1, 1]; higher is closer
    pub score: f32,
}

/// One document generation present in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentKey {
    pub source: String,
    pub uploaded_at: String,
    pub chunk_count: usize,
}

/// Result of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub uploaded_at: String,
    pub chunk_count: usize,
}

/// Result of a successful delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub filename: String,
    pub uploaded_at: String,
    pub chunks_removed: usize,

    /// False when the stored file is a later upload of the same name
    pub file_removed: bool,

    /// True when the last document was removed and the storage location deleted
    pub index_removed: bool,
}

/// Snapshot of one provider's index and storage.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    pub model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub store_path: PathBuf,
    pub upload_dir: PathBuf,
}
