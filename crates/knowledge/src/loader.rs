//! Document loading: text extraction and chunking.

use crate::types::{Chunk, ChunkMetadata};
use chrono::{DateTime, SecondsFormat, Utc};
use docrag_core::{AppConfig, AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};

/// Turns a stored file into ordered chunks stamped with its identity.
#[async_trait::async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load `path` and stamp every chunk with `{source: file name, uploaded_at}`.
    ///
    /// # Errors
    /// `NoExtractableText` when the document yields no chunks.
    async fn load(&self, path: &Path, uploaded_at: &str) -> AppResult<Vec<Chunk>>;
}

/// PDF loader backed by `pdf-extract` and `text-splitter`.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl PdfLoader {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

#[async_trait::async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path, uploaded_at: &str) -> AppResult<Vec<Chunk>> {
        let source = file_name(path)?;
        let bytes = tokio::fs::read(path).await?;
        let content_hash = calculate_hash(&bytes);

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| {
                tracing::warn!("PDF extraction for {} aborted: {}", source, e);
                AppError::NoExtractableText(source.clone())
            })?
            .map_err(|e| {
                tracing::warn!("Could not extract text from {}: {}", source, e);
                AppError::NoExtractableText(source.clone())
            })?;

        let mut chunks = split_text(
            &text,
            &source,
            uploaded_at,
            self.chunk_size,
            self.chunk_overlap,
        )?;
        if chunks.is_empty() {
            return Err(AppError::NoExtractableText(source));
        }

        let file_path = path.display().to_string();
        for chunk in &mut chunks {
            let extra = &mut chunk.metadata.extra;
            extra.insert("file_path".to_string(), file_path.clone().into());
            extra.insert("content_hash".to_string(), content_hash.clone().into());
        }

        tracing::debug!("Loaded {} chunks from {}", chunks.len(), source);
        Ok(chunks)
    }
}

/// Split extracted text into overlapping chunks.
///
/// Whitespace-only chunks are dropped. `start_index` is the byte offset of
/// the chunk within `text`.
pub fn split_text(
    text: &str,
    source: &str,
    uploaded_at: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> AppResult<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(chunk_overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunking settings: {}", e)))?;
    let splitter = TextSplitter::new(config);

    Ok(splitter
        .chunk_indices(text)
        .filter(|(_, piece)| !piece.trim().is_empty())
        .map(|(offset, piece)| {
            let mut metadata = ChunkMetadata::new(source, uploaded_at, offset);
            metadata
                .extra
                .insert("char_count".to_string(), piece.chars().count().into());
            Chunk::new(piece, metadata)
        })
        .collect())
}

/// The file's modification time as RFC 3339 UTC with microseconds.
///
/// This is the `uploaded_at` half of a document's identity.
pub fn timestamp_from_mtime(path: &Path) -> AppResult<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(format_timestamp(modified.into()))
}

pub(crate) fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SHA-256 of `bytes`, lowercase hex.
pub fn calculate_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn file_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Other(format!("Path has no file name: {}", path.display())))
}
