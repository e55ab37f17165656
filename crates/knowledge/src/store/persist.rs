//! On-disk layout of a vector store.
//!
//! A store directory holds three files:
//! - `manifest.json`: format version, embedder identity, metric, entry count
//! - `vectors.bin`: `count * dimensions` little-endian f32, row-major
//! - `docstore.json`: the chunks, in the same order as the vectors
//!
//! Saves are written into a sibling temp directory and swapped into place,
//! so a reader never observes a mix of old and new files.

use super::{DistanceMetric, IndexedChunk, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::types::Chunk;
use chrono::{DateTime, Utc};
use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const DOCSTORE_FILE: &str = "docstore.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    provider: String,
    model: String,
    dimensions: usize,
    metric: DistanceMetric,
    count: usize,
    saved_at: DateTime<Utc>,
}

impl VectorStore {
    /// Replace whatever is at `path` with this store.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let (parent, name) = split_path(path)?;
        fs::create_dir_all(&parent)?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let staging = parent.join(format!(".{}.tmp-{}", name, suffix));
        let retired = parent.join(format!(".{}.old-{}", name, suffix));

        if let Err(e) = self.write_files(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let had_previous = path.exists();
        if had_previous {
            if let Err(e) = fs::rename(path, &retired) {
                let _ = fs::remove_dir_all(&staging);
                return Err(AppError::Storage(format!(
                    "Failed to move previous index at {} aside: {}",
                    path.display(),
                    e
                )));
            }
        }

        if let Err(e) = fs::rename(&staging, path) {
            if had_previous {
                let _ = fs::rename(&retired, path);
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(AppError::Storage(format!(
                "Failed to move new index into {}: {}",
                path.display(),
                e
            )));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&retired) {
                tracing::warn!("Failed to clean up {}: {}", retired.display(), e);
            }
        }

        tracing::debug!("Saved {} chunks to {}", self.len(), path.display());
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> AppResult<()> {
        fs::create_dir_all(dir)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            metric: self.metric,
            count: self.entries.len(),
            saved_at: Utc::now(),
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        let mut bytes = Vec::with_capacity(self.entries.len() * self.dimensions * 4);
        for entry in &self.entries {
            for value in &entry.vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        fs::write(dir.join(VECTORS_FILE), bytes)?;

        let chunks: Vec<&Chunk> = self.chunks().collect();
        fs::write(dir.join(DOCSTORE_FILE), serde_json::to_vec(&chunks)?)?;
        Ok(())
    }

    /// Load the store at `path`, or `None` if nothing has been saved there.
    ///
    /// # Errors
    /// `Storage` if the files are unreadable or disagree with each other, or
    /// if the index was built by a different provider, model or dimensionality
    /// than `embedder`.
    pub fn load(path: &Path, embedder: &dyn EmbeddingProvider) -> AppResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let manifest: Manifest = read_json(&path.join(MANIFEST_FILE))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(AppError::Storage(format!(
                "Unsupported index format version {} at {}",
                manifest.format_version,
                path.display()
            )));
        }
        if manifest.provider != embedder.provider_name()
            || manifest.model != embedder.model_name()
            || manifest.dimensions != embedder.dimensions()
        {
            return Err(AppError::Storage(format!(
                "Index at {} was built with {}/{} ({} dims) but the configured embedder is {}/{} ({} dims)",
                path.display(),
                manifest.provider,
                manifest.model,
                manifest.dimensions,
                embedder.provider_name(),
                embedder.model_name(),
                embedder.dimensions()
            )));
        }

        let bytes = fs::read(path.join(VECTORS_FILE)).map_err(|e| storage_read_error(path, e))?;
        let expected_len = manifest.count * manifest.dimensions * 4;
        if bytes.len() != expected_len {
            return Err(AppError::Storage(format!(
                "{} holds {} bytes, manifest expects {}",
                VECTORS_FILE,
                bytes.len(),
                expected_len
            )));
        }

        let chunks: Vec<Chunk> = read_json(&path.join(DOCSTORE_FILE))?;
        if chunks.len() != manifest.count {
            return Err(AppError::Storage(format!(
                "{} holds {} chunks, manifest expects {}",
                DOCSTORE_FILE,
                chunks.len(),
                manifest.count
            )));
        }

        let row_bytes = manifest.dimensions * 4;
        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let row = &bytes[i * row_bytes..(i + 1) * row_bytes];
                let vector = row
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                IndexedChunk { vector, chunk }
            })
            .collect();

        tracing::debug!("Loaded {} chunks from {}", entries.len(), path.display());

        Ok(Some(Self::from_entries(
            manifest.provider,
            manifest.model,
            manifest.dimensions,
            entries,
        )))
    }
}

/// Delete a provider's storage location. Missing locations are not an error.
pub fn remove(path: &Path) -> AppResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!("Removed index at {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn split_path(path: &Path) -> AppResult<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Storage(format!("Invalid index path: {}", path.display())))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<T> {
    let bytes = fs::read(path).map_err(|e| storage_read_error(path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::Storage(format!("Corrupt {}: {}", path.display(), e)))
}

fn storage_read_error(path: &Path, e: std::io::Error) -> AppError {
    AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::types::ChunkMetadata;
    use tempfile::TempDir;

    async fn sample_store(embedder: &MockProvider) -> VectorStore {
        let mut first = ChunkMetadata::new("a.pdf", "2026-01-01T00:00:00.000001Z", 0);
        first
            .extra
            .insert("content_hash".to_string(), serde_json::json!("deadbeef"));
        let chunks = vec![
            Chunk::new("The warranty covers two years", first),
            Chunk::new(
                "Shipping takes five days",
                ChunkMetadata::new("b.pdf", "2026-01-02T00:00:00.000002Z", 17),
            ),
        ];
        VectorStore::create(chunks, embedder).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_path_is_none() {
        let temp = TempDir::new().unwrap();
        let embedder = MockProvider::new(32);
        let loaded = VectorStore::load(&temp.path().join("absent"), &embedder).unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_load_preserves_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        let embedder = MockProvider::new(32);
        let store = sample_store(&embedder).await;

        store.save(&path).unwrap();
        let loaded = VectorStore::load(&path, &embedder).unwrap().unwrap();

        assert_eq!(loaded.entries(), store.entries());
        assert_eq!(loaded.chunks().next().unwrap().metadata.extra["content_hash"], "deadbeef");
    }

    #[tokio::test]
    async fn test_save_creates_missing_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vector_store").join("ollama");
        let embedder = MockProvider::new(32);

        sample_store(&embedder).await.save(&path).unwrap();

        assert!(path.join(MANIFEST_FILE).is_file());
        let loaded = VectorStore::load(&path, &embedder).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        let embedder = MockProvider::new(32);
        let store = sample_store(&embedder).await;

        store.save(&path).unwrap();
        fs::write(path.join("stray.txt"), "left over").unwrap();

        let smaller = store.delete("a.pdf", "2026-01-01T00:00:00.000001Z").unwrap();
        smaller.save(&path).unwrap();

        assert!(!path.join("stray.txt").exists());
        let loaded = VectorStore::load(&path, &embedder).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);

        // Only the store directory remains; no staging or retired siblings.
        let siblings: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[tokio::test]
    async fn test_load_rejects_other_model() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        let embedder = MockProvider::new(32);
        sample_store(&embedder).await.save(&path).unwrap();

        let other = MockProvider::new(32).with_model("another-model");
        assert!(matches!(VectorStore::load(&path, &other), Err(AppError::Storage(_))));

        let wider = MockProvider::new(64);
        assert!(matches!(VectorStore::load(&path, &wider), Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_truncated_vectors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        let embedder = MockProvider::new(32);
        sample_store(&embedder).await.save(&path).unwrap();

        let bytes = fs::read(path.join(VECTORS_FILE)).unwrap();
        fs::write(path.join(VECTORS_FILE), &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(VectorStore::load(&path, &embedder), Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_docstore_count_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        let embedder = MockProvider::new(32);
        sample_store(&embedder).await.save(&path).unwrap();

        fs::write(path.join(DOCSTORE_FILE), "[]").unwrap();
        assert!(matches!(VectorStore::load(&path, &embedder), Err(AppError::Storage(_))));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store");
        fs::create_dir_all(&path).unwrap();

        remove(&path).unwrap();
        assert!(!path.exists());
        remove(&path).unwrap();
    }
}
