//! Retrieval-augmented answering over a provider's index.

pub mod ask;
pub mod types;

pub use ask::{
    answer, answer_stream, build_context, map_chunks_to_sources, retrieve, DEFAULT_TOP_K,
};
pub use types::{RagAnswer, RagSourceRef};
