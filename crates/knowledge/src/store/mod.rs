//! Per-provider vector index.
//!
//! A [`VectorStore`] is an ordered list of `(vector, chunk)` pairs plus a
//! flat cosine search structure. It supports two mutations: append, which
//! embeds only the new chunks, and filter-rebuild, which drops one document
//! generation and reconstructs the search structure from the surviving
//! vectors without calling the embedder again.

mod flat;
mod persist;

pub use persist::remove;

use crate::embeddings::EmbeddingProvider;
use crate::types::{Chunk, DocumentKey, ScoredChunk};
use docrag_core::{AppError, AppResult};
use flat::FlatIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Similarity metric. Fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
}

/// A chunk and the vector it was embedded to.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// Chunks embedded by one provider, not yet part of any store.
///
/// Produced by [`VectorStore::embed_chunks`] so that embedding can run
/// before the caller takes a write lock.
#[derive(Debug, Clone)]
pub struct EmbeddedBatch {
    provider: String,
    model: String,
    dimensions: usize,
    entries: Vec<IndexedChunk>,
}

impl EmbeddedBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    provider: String,
    model: String,
    dimensions: usize,
    metric: DistanceMetric,
    entries: Vec<IndexedChunk>,
    index: FlatIndex,
}

impl VectorStore {
    /// Embed every chunk and build a fresh index.
    ///
    /// # Errors
    /// `EmptyInput` when `chunks` is empty; embedding failures propagate.
    pub async fn create(chunks: Vec<Chunk>, embedder: &dyn EmbeddingProvider) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::EmptyInput);
        }
        let batch = Self::embed_chunks(chunks, embedder).await?;
        Self::from_batch(batch)
    }

    /// Add chunks to `store`, or create a new store when there is none.
    ///
    /// Existing vectors are neither re-embedded nor reordered.
    pub async fn append(
        store: Option<VectorStore>,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<Self> {
        if chunks.is_empty() {
            return match store {
                Some(store) => Ok(store),
                None => Err(AppError::EmptyInput),
            };
        }
        let batch = Self::embed_chunks(chunks, embedder).await?;
        Self::append_embedded(store, batch)
    }

    /// Embed chunks without touching any store.
    pub async fn embed_chunks(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<EmbeddedBatch> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(AppError::EmbeddingBackend(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::EmbeddingBackend(format!(
                "Embedder returned a {}-dimensional vector, expected {}",
                bad.len(),
                dimensions
            )));
        }

        tracing::debug!(
            "Embedded {} chunks with {} ({})",
            chunks.len(),
            embedder.provider_name(),
            embedder.model_name()
        );

        Ok(EmbeddedBatch {
            provider: embedder.provider_name().to_string(),
            model: embedder.model_name().to_string(),
            dimensions,
            entries: vectors
                .into_iter()
                .zip(chunks)
                .map(|(vector, chunk)| IndexedChunk { vector, chunk })
                .collect(),
        })
    }

    /// Build a store from already-embedded chunks.
    pub fn from_batch(batch: EmbeddedBatch) -> AppResult<Self> {
        if batch.entries.is_empty() {
            return Err(AppError::EmptyInput);
        }
        Ok(Self::from_entries(
            batch.provider,
            batch.model,
            batch.dimensions,
            batch.entries,
        ))
    }

    /// Structural half of [`append`](Self::append): push embedded chunks.
    ///
    /// # Errors
    /// `Storage` when the batch came from a different provider, model or
    /// dimensionality than the store.
    pub fn append_embedded(store: Option<VectorStore>, batch: EmbeddedBatch) -> AppResult<Self> {
        let Some(mut store) = store else {
            return Self::from_batch(batch);
        };

        if batch.provider != store.provider
            || batch.model != store.model
            || batch.dimensions != store.dimensions
        {
            return Err(AppError::Storage(format!(
                "Cannot append {}/{} ({} dims) vectors to a {}/{} ({} dims) index",
                batch.provider,
                batch.model,
                batch.dimensions,
                store.provider,
                store.model,
                store.dimensions
            )));
        }

        for entry in batch.entries {
            store.index.push(&entry.vector);
            store.entries.push(entry);
        }
        Ok(store)
    }

    pub(crate) fn from_entries(
        provider: String,
        model: String,
        dimensions: usize,
        entries: Vec<IndexedChunk>,
    ) -> Self {
        let index = FlatIndex::build(&entries);
        Self {
            provider,
            model,
            dimensions,
            metric: DistanceMetric::Cosine,
            entries,
            index,
        }
    }

    /// Remove every chunk of `(filename, uploaded_at)`.
    ///
    /// Returns `None` when no chunk survives.
    pub fn delete(&self, filename: &str, uploaded_at: &str) -> Option<VectorStore> {
        self.delete_document(filename, uploaded_at).0
    }

    /// Like [`delete`](Self::delete), also reporting how many chunks matched.
    pub fn delete_document(&self, filename: &str, uploaded_at: &str) -> (Option<VectorStore>, usize) {
        let (removed, kept): (Vec<&IndexedChunk>, Vec<&IndexedChunk>) = self
            .entries
            .iter()
            .partition(|e| e.chunk.metadata.matches(filename, uploaded_at));

        tracing::debug!(
            "Rebuilding index without {}@{}: {} removed, {} kept",
            filename,
            uploaded_at,
            removed.len(),
            kept.len()
        );

        if kept.is_empty() {
            return (None, removed.len());
        }

        let rebuilt = Self::from_entries(
            self.provider.clone(),
            self.model.clone(),
            self.dimensions,
            kept.into_iter().cloned().collect(),
        );
        (Some(rebuilt), removed.len())
    }

    /// Top `k` chunks by cosine similarity to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<ScoredChunk>> {
        if query.len() != self.dimensions {
            return Err(AppError::Storage(format!(
                "Query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        Ok(self
            .index
            .search(&self.entries, query, k)
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Distinct document generations, in the order they were first added.
    pub fn document_keys(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<DocumentKey> = Vec::new();
        let mut positions: HashMap<(&str, &str), usize> = HashMap::new();

        for entry in &self.entries {
            let metadata = &entry.chunk.metadata;
            let key = (metadata.source.as_str(), metadata.uploaded_at.as_str());
            match positions.get(&key) {
                Some(&i) => keys[i].chunk_count += 1,
                None => {
                    positions.insert(key, keys.len());
                    keys.push(DocumentKey {
                        source: metadata.source.clone(),
                        uploaded_at: metadata.uploaded_at.clone(),
                        chunk_count: 1,
                    });
                }
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.entries.len(), self.index.len());
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::types::ChunkMetadata;

    fn chunk(source: &str, uploaded_at: &str, content: &str) -> Chunk {
        Chunk::new(content, ChunkMetadata::new(source, uploaded_at, 0))
    }

    #[tokio::test]
    async fn test_create_rejects_empty_input() {
        let embedder = MockProvider::new(16);
        let result = VectorStore::create(Vec::new(), &embedder).await;
        assert!(matches!(result, Err(AppError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_create_records_embedder_identity() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::create(vec![chunk("a.pdf", "t1", "alpha text")], &embedder)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.provider(), "mock");
        assert_eq!(store.model(), "hashed-trigram");
        assert_eq!(store.dimensions(), 16);
        assert_eq!(store.metric(), DistanceMetric::Cosine);
    }

    #[tokio::test]
    async fn test_append_none_behaves_as_create() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::append(None, vec![chunk("a.pdf", "t1", "alpha")], &embedder)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_append_rejects_other_model() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::create(vec![chunk("a.pdf", "t1", "alpha")], &embedder)
            .await
            .unwrap();

        let other = MockProvider::new(16).with_model("different");
        let result = VectorStore::append(Some(store), vec![chunk("b.pdf", "t2", "beta")], &other).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_query_dimensions() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::create(vec![chunk("a.pdf", "t1", "alpha")], &embedder)
            .await
            .unwrap();
        assert!(matches!(store.search(&[1.0; 8], 1), Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_document_keys_first_seen_order() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::create(
            vec![
                chunk("b.pdf", "t2", "one"),
                chunk("a.pdf", "t1", "two"),
                chunk("b.pdf", "t2", "three"),
            ],
            &embedder,
        )
        .await
        .unwrap();

        let keys = store.document_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].source, "b.pdf");
        assert_eq!(keys[0].chunk_count, 2);
        assert_eq!(keys[1].source, "a.pdf");
        assert_eq!(keys[1].chunk_count, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_removed_count() {
        let embedder = MockProvider::new(16);
        let store = VectorStore::create(
            vec![
                chunk("a.pdf", "t1", "one"),
                chunk("a.pdf", "t1", "two"),
                chunk("b.pdf", "t1", "three"),
            ],
            &embedder,
        )
        .await
        .unwrap();

        let (rebuilt, removed) = store.delete_document("a.pdf", "t1");
        assert_eq!(removed, 2);
        assert_eq!(rebuilt.unwrap().len(), 1);

        let (unchanged, removed) = store.delete_document("missing.pdf", "t1");
        assert_eq!(removed, 0);
        assert_eq!(unchanged.unwrap().len(), 3);
    }
}
