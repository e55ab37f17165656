//! Answer types.

use crate::types::ScoredChunk;
use serde::Serialize;

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagSourceRef {
    /// Source file name
    pub source: String,

    /// Generation of the source file
    pub uploaded_at: String,

    /// Short excerpt of the best-matching chunk (truncated if needed)
    pub snippet: String,
}

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,

    /// Retrieved chunks, best first
    pub chunks: Vec<ScoredChunk>,

    /// Distinct documents among `chunks`, in rank order
    pub sources: Vec<RagSourceRef>,
}

impl RagAnswer {
    pub fn new(answer: String, chunks: Vec<ScoredChunk>) -> Self {
        let sources = super::ask::map_chunks_to_sources(&chunks);
        Self {
            answer,
            chunks,
            sources,
        }
    }

    /// Highest similarity among the retrieved chunks.
    pub fn max_score(&self) -> Option<f32> {
        self.chunks.first().map(|c| c.score)
    }
}
