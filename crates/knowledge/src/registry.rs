//! Document registry.
//!
//! There is no separate document database. The registry is computed on
//! demand by joining the distinct `(source, uploaded_at)` keys in a
//! provider's index with the files in its upload directory. When the two
//! disagree the entry is flagged, never repaired.

use crate::loader::timestamp_from_mtime;
use crate::store::VectorStore;
use docrag_core::AppResult;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

/// How a document's index entries relate to its stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Chunks are indexed and the file is the one they were built from.
    Indexed,
    /// Chunks are indexed but the file is gone.
    MissingFile,
    /// The file exists but nothing in the index refers to it.
    Unindexed,
    /// Chunks from an older generation of a file that has since changed.
    Superseded,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::MissingFile => "missing_file",
            DocumentStatus::Unindexed => "unindexed",
            DocumentStatus::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentEntry {
    pub filename: String,

    /// File name without its extension
    pub name: String,

    /// Extension without the leading dot
    pub extension: String,

    pub uploaded_at: String,

    /// Current size of the stored file, when it exists
    pub size_bytes: Option<u64>,

    pub size_formatted: Option<String>,

    pub chunk_count: usize,

    pub status: DocumentStatus,
}

impl DocumentEntry {
    fn new(filename: &str, uploaded_at: &str, status: DocumentStatus) -> Self {
        let (name, extension) = split_extension(filename);
        Self {
            filename: filename.to_string(),
            name,
            extension,
            uploaded_at: uploaded_at.to_string(),
            size_bytes: None,
            size_formatted: None,
            chunk_count: 0,
            status,
        }
    }

    fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = Some(size);
        self.size_formatted = Some(format_file_size(size));
        self
    }
}

struct StoredFile {
    uploaded_at: String,
    size: u64,
}

/// List a provider's documents, newest first.
pub fn list_documents(store: Option<&VectorStore>, upload_dir: &Path) -> AppResult<Vec<DocumentEntry>> {
    let mut files = scan_upload_dir(upload_dir)?;
    let keys = store.map(|s| s.document_keys()).unwrap_or_default();

    let mut entries = Vec::with_capacity(keys.len() + files.len());
    let mut claimed: Vec<String> = Vec::new();

    for key in keys {
        let entry = match files.get(&key.source) {
            Some(file) if file.uploaded_at == key.uploaded_at => {
                claimed.push(key.source.clone());
                DocumentEntry::new(&key.source, &key.uploaded_at, DocumentStatus::Indexed)
                    .with_size(file.size)
            }
            Some(_) => {
                tracing::warn!(
                    "Index holds {}@{} but the stored file has changed since",
                    key.source,
                    key.uploaded_at
                );
                DocumentEntry::new(&key.source, &key.uploaded_at, DocumentStatus::Superseded)
            }
            None => {
                tracing::warn!(
                    "Index holds {}@{} but the file is missing from {}",
                    key.source,
                    key.uploaded_at,
                    upload_dir.display()
                );
                DocumentEntry::new(&key.source, &key.uploaded_at, DocumentStatus::MissingFile)
            }
        };
        entries.push(DocumentEntry {
            chunk_count: key.chunk_count,
            ..entry
        });
    }

    for filename in claimed {
        files.remove(&filename);
    }

    for (filename, file) in files {
        tracing::warn!("Stored file {} has no index entries", filename);
        entries.push(
            DocumentEntry::new(&filename, &file.uploaded_at, DocumentStatus::Unindexed)
                .with_size(file.size),
        );
    }

    entries.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    Ok(entries)
}

fn scan_upload_dir(upload_dir: &Path) -> AppResult<HashMap<String, StoredFile>> {
    let mut files = HashMap::new();
    if !upload_dir.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(upload_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", upload_dir.display());
            continue;
        };

        let size = entry.metadata().map_err(std::io::Error::from)?.len();
        files.insert(
            filename.to_string(),
            StoredFile {
                uploaded_at: timestamp_from_mtime(entry.path())?,
                size,
            },
        );
    }
    Ok(files)
}

fn split_extension(filename: &str) -> (String, String) {
    match filename.rsplit_once('.') {
        Some((name, ext)) if !name.is_empty() => (name.to_string(), ext.to_string()),
        _ => (filename.to_string(), String::new()),
    }
}

/// Human-readable size with one decimal, e.g. `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::types::{Chunk, ChunkMetadata};
    use tempfile::TempDir;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3.0 TB");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.final.pdf"), ("report.final".into(), "pdf".into()));
        assert_eq!(split_extension("README"), ("README".into(), String::new()));
        assert_eq!(split_extension(".hidden"), (".hidden".into(), String::new()));
    }

    #[test]
    fn test_empty_without_store_or_dir() {
        let temp = TempDir::new().unwrap();
        let entries = list_documents(None, &temp.path().join("missing")).unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_status_classification() {
        let temp = TempDir::new().unwrap();
        let upload_dir = temp.path();

        // indexed.pdf: file matches its index key
        let indexed = upload_dir.join("indexed.pdf");
        std::fs::write(&indexed, b"0123456789").unwrap();
        let indexed_at = timestamp_from_mtime(&indexed).unwrap();

        // changed.pdf: index key from an older generation
        std::fs::write(upload_dir.join("changed.pdf"), b"new").unwrap();

        // loose.pdf: file with no index entries
        std::fs::write(upload_dir.join("loose.pdf"), b"loose").unwrap();

        let chunk = |source: &str, at: &str| Chunk::new("text", ChunkMetadata::new(source, at, 0));
        let embedder = MockProvider::new(8);
        let store = VectorStore::create(
            vec![
                chunk("indexed.pdf", &indexed_at),
                chunk("indexed.pdf", &indexed_at),
                chunk("changed.pdf", "2000-01-01T00:00:00.000000Z"),
                chunk("gone.pdf", "2000-01-02T00:00:00.000000Z"),
            ],
            &embedder,
        )
        .await
        .unwrap();

        let entries = list_documents(Some(&store), upload_dir).unwrap();
        let statuses_of = |name: &str| {
            let mut statuses: Vec<DocumentStatus> = entries
                .iter()
                .filter(|e| e.filename == name)
                .map(|e| e.status)
                .collect();
            statuses.sort_by_key(|s| s.as_str());
            statuses
        };

        // changed.pdf shows up twice: the stale index key and the unclaimed file
        assert_eq!(entries.len(), 5);
        assert_eq!(statuses_of("indexed.pdf"), vec![DocumentStatus::Indexed]);
        assert_eq!(
            statuses_of("changed.pdf"),
            vec![DocumentStatus::Superseded, DocumentStatus::Unindexed]
        );
        assert_eq!(statuses_of("gone.pdf"), vec![DocumentStatus::MissingFile]);
        assert_eq!(statuses_of("loose.pdf"), vec![DocumentStatus::Unindexed]);

        let indexed_entry = entries.iter().find(|e| e.filename == "indexed.pdf").unwrap();
        assert_eq!(indexed_entry.chunk_count, 2);
        assert_eq!(indexed_entry.size_bytes, Some(10));
        assert_eq!(indexed_entry.extension, "pdf");
        assert_eq!(indexed_entry.name, "indexed");
    }

    #[tokio::test]
    async fn test_sorted_newest_first() {
        let temp = TempDir::new().unwrap();
        let chunk = |source: &str, at: &str| Chunk::new("text", ChunkMetadata::new(source, at, 0));
        let embedder = MockProvider::new(8);
        let store = VectorStore::create(
            vec![
                chunk("old.pdf", "2024-01-01T00:00:00.000000Z"),
                chunk("new.pdf", "2025-06-01T00:00:00.000000Z"),
                chunk("mid.pdf", "2024-09-01T00:00:00.000000Z"),
            ],
            &embedder,
        )
        .await
        .unwrap();

        let entries = list_documents(Some(&store), temp.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["new.pdf", "mid.pdf", "old.pdf"]);
    }
}
