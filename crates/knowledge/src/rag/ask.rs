//! Retrieval and answer generation.
//!
//! Embeds the question with the provider's embedder, searches the index,
//! joins the hits into a context block and asks the LLM to answer from it.

use crate::embeddings::EmbeddingProvider;
use crate::rag::types::{RagAnswer, RagSourceRef};
use crate::store::VectorStore;
use crate::types::ScoredChunk;
use docrag_core::{AppError, AppResult};
use docrag_llm::{LlmClient, LlmRequest, LlmStream};
use handlebars::Handlebars;
use std::collections::HashSet;

/// Chunks retrieved per question unless the caller asks otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Maximum snippet length (in characters) for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

const SYSTEM_TEMPLATE: &str = "You are an expert assistant for answering questions about the provided PDF documents. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know.\n\n{{context}}";

/// Embed `question` and return the `k` closest chunks.
pub async fn retrieve(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    k: usize,
) -> AppResult<Vec<ScoredChunk>> {
    let query = embedder.embed(question).await?;
    let hits = store.search(&query, k)?;

    tracing::debug!(
        "Retrieved {} chunks for question (top score: {:.3})",
        hits.len(),
        hits.first().map(|h| h.score).unwrap_or(0.0)
    );
    Ok(hits)
}

/// Join chunk contents with blank lines, best hit first.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the system prompt around a context block.
pub(crate) fn render_system_prompt(context: &str) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    // Context is PDF text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("system", SYSTEM_TEMPLATE)
        .map_err(|e| AppError::Other(format!("Invalid system prompt template: {}", e)))?;

    handlebars
        .render("system", &serde_json::json!({ "context": context }))
        .map_err(|e| AppError::Other(format!("Failed to render system prompt: {}", e)))
}

fn build_request(
    llm: &dyn LlmClient,
    model: Option<&str>,
    question: &str,
    chunks: &[ScoredChunk],
) -> AppResult<LlmRequest> {
    let system = render_system_prompt(&build_context(chunks))?;
    let mut request = LlmRequest::new(question, model.unwrap_or(llm.default_model())).with_system(system);
    if let Some(temperature) = llm.default_temperature() {
        request = request.with_temperature(temperature);
    }
    Ok(request)
}

fn generation_error(e: AppError) -> AppError {
    match e {
        AppError::GenerationBackend(_) => e,
        other => AppError::GenerationBackend(other.to_string()),
    }
}

/// Retrieve context for `question` and generate an answer.
///
/// # Errors
/// Embedding failures propagate unchanged; any failure of the LLM call is
/// reported as `GenerationBackend`.
pub async fn answer(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    llm: &dyn LlmClient,
    model: Option<&str>,
    question: &str,
    k: usize,
) -> AppResult<RagAnswer> {
    let chunks = retrieve(store, embedder, question, k).await?;
    let request = build_request(llm, model, question, &chunks)?;

    tracing::info!(
        "Generating answer with {} ({}) from {} chunks",
        llm.provider_name(),
        request.model,
        chunks.len()
    );

    let response = llm.complete(&request).await.map_err(generation_error)?;
    tracing::debug!(
        "Generation used {} tokens ({} prompt)",
        response.usage.total(),
        response.usage.prompt_tokens
    );
    Ok(RagAnswer::new(response.content, chunks))
}

/// Like [`answer`], but streams the generated text.
///
/// Returns the token stream together with the retrieved chunks.
pub async fn answer_stream(
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    llm: &dyn LlmClient,
    model: Option<&str>,
    question: &str,
    k: usize,
) -> AppResult<(LlmStream, Vec<ScoredChunk>)> {
    let chunks = retrieve(store, embedder, question, k).await?;
    let request = build_request(llm, model, question, &chunks)?.with_streaming();

    let stream = llm.stream(&request).await.map_err(generation_error)?;
    Ok((stream, chunks))
}

/// One reference per distinct document, in rank order.
pub fn map_chunks_to_sources(chunks: &[ScoredChunk]) -> Vec<RagSourceRef> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| {
            let metadata = &c.chunk.metadata;
            seen.insert((metadata.source.clone(), metadata.uploaded_at.clone()))
        })
        .map(|c| RagSourceRef {
            source: c.chunk.metadata.source.clone(),
            uploaded_at: c.chunk.metadata.uploaded_at.clone(),
            snippet: truncate_snippet(&c.chunk.content, MAX_SNIPPET_LENGTH),
        })
        .collect()
}

/// Truncate to at most `max_chars` characters, preferring a word boundary.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(space) if space > 0 => format!("{}...", &truncated[..space]),
        _ => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};

    fn scored(source: &str, at: &str, content: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(content, ChunkMetadata::new(source, at, 0)),
            score,
        }
    }

    #[test]
    fn test_build_context_joins_with_blank_lines() {
        let chunks = vec![scored("a.pdf", "t", "first", 0.9), scored("b.pdf", "t", "second", 0.5)];
        assert_eq!(build_context(&chunks), "first\n\nsecond");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_system_prompt_does_not_escape() {
        let prompt = render_system_prompt("Revenue < costs & \"margin\"").unwrap();
        assert!(prompt.starts_with("You are an expert assistant"));
        assert!(prompt.contains("say that you don't know"));
        assert!(prompt.ends_with("Revenue < costs & \"margin\""));
    }

    #[test]
    fn test_sources_deduplicate_by_document() {
        let chunks = vec![
            scored("a.pdf", "t1", "one", 0.9),
            scored("a.pdf", "t1", "two", 0.8),
            scored("a.pdf", "t2", "three", 0.7),
        ];
        let sources = map_chunks_to_sources(&chunks);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].snippet, "one");
        assert_eq!(sources[1].uploaded_at, "t2");
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("short", 10), "short");
        assert_eq!(truncate_snippet("alpha beta gamma", 12), "alpha beta...");
        // Multi-byte characters never split
        assert_eq!(truncate_snippet("ééééé", 3), "ééé...");
    }
}
