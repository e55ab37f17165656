//! Document lifecycle manager.
//!
//! [`DocumentManager`] keeps each provider's vector index in step with the
//! files in that provider's upload directory. Every provider has its own
//! slot: a resolved [`ProviderContext`], a generation client and the
//! in-memory index behind a `tokio::sync::RwLock`.
//!
//! Locking rules:
//! - Embedding and generation run without holding any lock.
//! - Mutations take the write lock for the structural change plus the save,
//!   so appends and deletes on one provider are serialized.
//! - Readers clone an `Arc` snapshot under the read lock and release it.
//! - The in-memory index is replaced only after the new one is persisted.

use crate::loader::{timestamp_from_mtime, DocumentLoader, PdfLoader};
use crate::provider::{self, ProviderContext};
use crate::rag::{self, RagAnswer};
use crate::registry::{self, DocumentEntry};
use crate::store::{self, VectorStore};
use crate::types::{Chunk, DeleteReport, IngestReport, ProviderStatus, ScoredChunk};
use docrag_core::{AppConfig, AppError, AppResult, ProviderKind};
use docrag_llm::{create_client, LlmClient, LlmStream};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Upload staging directories live next to the stored files under this prefix.
const STAGING_PREFIX: &str = ".staging-";

/// One provider's context, LLM and live index.
pub struct ProviderSlot {
    context: ProviderContext,
    llm: Arc<dyn LlmClient>,
    store: RwLock<Option<Arc<VectorStore>>>,
}

impl ProviderSlot {
    /// Current index, if any. The lock is released before returning.
    pub async fn snapshot(&self) -> Option<Arc<VectorStore>> {
        self.store.read().await.clone()
    }

    async fn require_snapshot(&self) -> AppResult<Arc<VectorStore>> {
        self.snapshot()
            .await
            .ok_or_else(|| AppError::IndexNotFound(self.context.kind.to_string()))
    }
}

pub struct DocumentManager {
    slots: BTreeMap<ProviderKind, ProviderSlot>,
    loader: Arc<dyn DocumentLoader>,
    top_k: usize,
}

impl DocumentManager {
    /// Create a manager with no providers registered.
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            slots: BTreeMap::new(),
            loader,
            top_k: rag::DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Build a manager for `providers` from configuration, loading each
    /// provider's persisted index.
    pub fn open(config: &AppConfig, providers: &[ProviderKind]) -> AppResult<Self> {
        let loader = Arc::new(PdfLoader::from_config(config));
        let mut manager = Self::new(loader).with_top_k(config.top_k);

        for &kind in providers {
            let context = provider::resolve(kind, config)?;
            let llm = create_client(config, kind)?;
            manager.register(context, llm)?;
        }
        Ok(manager)
    }

    /// Add a provider, loading its index from disk if one was saved.
    pub fn register(&mut self, context: ProviderContext, llm: Arc<dyn LlmClient>) -> AppResult<()> {
        let store = VectorStore::load(&context.store_path, context.embedder.as_ref())?;

        match &store {
            Some(s) => tracing::info!(
                "Loaded {} index: {} chunks from {}",
                context.kind,
                s.len(),
                context.store_path.display()
            ),
            None => tracing::info!("No saved index for {} yet", context.kind),
        }

        self.slots.insert(
            context.kind,
            ProviderSlot {
                context,
                llm,
                store: RwLock::new(store.map(Arc::new)),
            },
        );
        Ok(())
    }

    pub fn slot(&self, provider: ProviderKind) -> AppResult<&ProviderSlot> {
        self.slots.get(&provider).ok_or_else(|| {
            AppError::Config(format!("Provider '{}' is not enabled", provider))
        })
    }

    /// Store `bytes` as `filename` and index its chunks.
    ///
    /// The upload is written to a staging directory and only moved over
    /// `upload_dir/filename` once the loader has produced chunks, so a
    /// rejected document never replaces an earlier upload of the same name.
    /// If embedding or saving fails the file stays on disk with no index
    /// entries; the in-memory index is unchanged.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        filename: &str,
        provider: ProviderKind,
    ) -> AppResult<IngestReport> {
        validate_filename(filename)?;
        let slot = self.slot(provider)?;
        let context = &slot.context;

        tokio::fs::create_dir_all(&context.upload_dir).await?;
        let path = context.upload_dir.join(filename);
        let staging_dir = context.upload_dir.join(format!(
            "{}{}",
            STAGING_PREFIX,
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::create_dir(&staging_dir).await?;

        let staged = self
            .load_staged(&staging_dir.join(filename), &path, bytes, filename, provider)
            .await;
        if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await {
            tracing::warn!("Failed to remove staging directory {}: {}", staging_dir.display(), e);
        }
        let (uploaded_at, mut chunks) = staged?;

        let stored = path.display().to_string();
        for chunk in &mut chunks {
            if let Some(value) = chunk.metadata.extra.get_mut("file_path") {
                *value = stored.clone().into();
            }
        }
        let chunk_count = chunks.len();

        let batch = VectorStore::embed_chunks(chunks, context.embedder.as_ref())
            .await
            .inspect_err(|e| warn_orphan_file(filename, e))?;

        {
            let mut guard = slot.store.write().await;
            let current = guard.as_deref().cloned();
            let updated = VectorStore::append_embedded(current, batch)
                .and_then(|updated| updated.save(&context.store_path).map(|()| updated))
                .inspect_err(|e| warn_orphan_file(filename, e))?;

            tracing::info!(
                "{} index now holds {} chunks",
                provider,
                updated.len()
            );
            *guard = Some(Arc::new(updated));
        }

        Ok(IngestReport {
            filename: filename.to_string(),
            uploaded_at,
            chunk_count,
        })
    }

    /// Ingest a local file under its own file name.
    pub async fn ingest_file(&self, path: &Path, provider: ProviderKind) -> AppResult<IngestReport> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::AccessDenied(path.display().to_string()))?;
        let bytes = tokio::fs::read(path).await?;
        self.ingest(&bytes, filename, provider).await
    }

    /// Write `bytes` to `staged`, load it, and move it to `path` on success.
    async fn load_staged(
        &self,
        staged: &Path,
        path: &Path,
        bytes: &[u8],
        filename: &str,
        provider: ProviderKind,
    ) -> AppResult<(String, Vec<Chunk>)> {
        tokio::fs::write(staged, bytes).await?;
        let uploaded_at = timestamp_from_mtime(staged)?;

        tracing::info!(
            "Ingesting {} ({} bytes) into {} as {}",
            filename,
            bytes.len(),
            provider,
            uploaded_at
        );

        let chunks = match self.loader.load(staged, &uploaded_at).await {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) | Err(AppError::NoExtractableText(_)) => {
                tracing::info!("{} has no extractable text; keeping any earlier upload", filename);
                return Err(AppError::NoExtractableText(filename.to_string()));
            }
            Err(e) => return Err(e),
        };

        // Rename keeps the mtime, so the stamp still identifies the stored file.
        tokio::fs::rename(staged, path).await?;
        Ok((uploaded_at, chunks))
    }

    /// Answer `question` from the provider's documents.
    pub async fn query(
        &self,
        question: &str,
        provider: ProviderKind,
        k: Option<usize>,
    ) -> AppResult<RagAnswer> {
        let slot = self.slot(provider)?;
        let store = slot.require_snapshot().await?;
        rag::answer(
            &store,
            slot.context.embedder.as_ref(),
            slot.llm.as_ref(),
            None,
            question,
            k.unwrap_or(self.top_k),
        )
        .await
    }

    /// Streaming variant of [`query`](Self::query).
    pub async fn query_stream(
        &self,
        question: &str,
        provider: ProviderKind,
        k: Option<usize>,
    ) -> AppResult<(LlmStream, Vec<ScoredChunk>)> {
        let slot = self.slot(provider)?;
        let store = slot.require_snapshot().await?;
        rag::answer_stream(
            &store,
            slot.context.embedder.as_ref(),
            slot.llm.as_ref(),
            None,
            question,
            k.unwrap_or(self.top_k),
        )
        .await
    }

    /// Retrieval only: the closest chunks to `question`.
    pub async fn search(
        &self,
        question: &str,
        provider: ProviderKind,
        k: Option<usize>,
    ) -> AppResult<Vec<ScoredChunk>> {
        let slot = self.slot(provider)?;
        let store = slot.require_snapshot().await?;
        rag::retrieve(
            &store,
            slot.context.embedder.as_ref(),
            question,
            k.unwrap_or(self.top_k),
        )
        .await
    }

    pub async fn list_documents(&self, provider: ProviderKind) -> AppResult<Vec<DocumentEntry>> {
        let slot = self.slot(provider)?;
        let store = slot.snapshot().await;
        registry::list_documents(store.as_deref(), &slot.context.upload_dir)
    }

    /// Remove one document generation from the index and its file from disk.
    ///
    /// # Errors
    /// - `IndexNotFound` when the provider has no index.
    /// - `DocumentNotFound` when neither the index nor the upload directory
    ///   holds this generation.
    /// - `PartialDeletion` when the index changed but the file was already
    ///   gone or could not be removed.
    pub async fn delete(
        &self,
        filename: &str,
        uploaded_at: &str,
        provider: ProviderKind,
    ) -> AppResult<DeleteReport> {
        validate_filename(filename)?;
        let slot = self.slot(provider)?;
        let context = &slot.context;
        let path = context.upload_dir.join(filename);

        let mut guard = slot.store.write().await;
        let store = guard
            .clone()
            .ok_or_else(|| AppError::IndexNotFound(provider.to_string()))?;

        let (rebuilt, removed) = store.delete_document(filename, uploaded_at);
        let file_stamp = path.is_file().then(|| timestamp_from_mtime(&path)).transpose()?;

        if removed == 0 {
            // Only a file of exactly this generation may be cleaned up here.
            return match file_stamp {
                Some(stamp) if stamp == uploaded_at => {
                    tracing::warn!(
                        "{}@{} had no index entries; removing the orphaned file",
                        filename,
                        uploaded_at
                    );
                    std::fs::remove_file(&path)?;
                    Ok(DeleteReport {
                        filename: filename.to_string(),
                        uploaded_at: uploaded_at.to_string(),
                        chunks_removed: 0,
                        file_removed: true,
                        index_removed: false,
                    })
                }
                _ => Err(AppError::DocumentNotFound {
                    filename: filename.to_string(),
                    uploaded_at: uploaded_at.to_string(),
                }),
            };
        }

        let index_removed = rebuilt.is_none();
        match rebuilt {
            Some(updated) => {
                updated.save(&context.store_path)?;
                tracing::info!(
                    "Removed {} chunks of {}@{}; {} index now holds {} chunks",
                    removed,
                    filename,
                    uploaded_at,
                    provider,
                    updated.len()
                );
                *guard = Some(Arc::new(updated));
            }
            None => {
                store::remove(&context.store_path)?;
                tracing::info!(
                    "Removed last document {}@{}; deleted {} index",
                    filename,
                    uploaded_at,
                    provider
                );
                *guard = None;
            }
        }

        // A file with another stamp is a later upload of the same name.
        let file_kept = matches!(&file_stamp, Some(stamp) if stamp != uploaded_at);
        drop(guard);

        if file_kept {
            tracing::warn!(
                "Kept {}: the stored file is a later upload than {}",
                filename,
                uploaded_at
            );
        } else {
            remove_uploaded_file(&path, filename)?;
        }

        Ok(DeleteReport {
            filename: filename.to_string(),
            uploaded_at: uploaded_at.to_string(),
            chunks_removed: removed,
            file_removed: !file_kept,
            index_removed,
        })
    }

    pub async fn status(&self, provider: ProviderKind) -> AppResult<ProviderStatus> {
        let slot = self.slot(provider)?;
        let store = slot.snapshot().await;
        let embedder = &slot.context.embedder;

        Ok(ProviderStatus {
            provider,
            model: embedder.model_name().to_string(),
            dimensions: embedder.dimensions(),
            chunk_count: store.as_ref().map(|s| s.len()).unwrap_or(0),
            document_count: store.as_ref().map(|s| s.document_keys().len()).unwrap_or(0),
            store_path: slot.context.store_path.clone(),
            upload_dir: slot.context.upload_dir.clone(),
        })
    }

    /// Path of a stored upload.
    pub fn document_path(&self, filename: &str, provider: ProviderKind) -> AppResult<PathBuf> {
        validate_filename(filename)?;
        let path = self.slot(provider)?.context.upload_dir.join(filename);
        if !path.is_file() {
            return Err(AppError::FileNotFound(filename.to_string()));
        }
        Ok(path)
    }
}

/// Accept only a single plain path component.
pub fn validate_filename(filename: &str) -> AppResult<()> {
    let mut components = Path::new(filename).components();
    let valid = !filename.contains(['/', '\\', '\0'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();

    if valid {
        Ok(())
    } else {
        Err(AppError::AccessDenied(filename.to_string()))
    }
}

fn remove_uploaded_file(path: &Path, filename: &str) -> AppResult<()> {
    if !path.exists() {
        tracing::warn!("Index updated but {} was already missing", filename);
        return Err(AppError::PartialDeletion {
            filename: filename.to_string(),
            detail: "index updated but the file was already missing".to_string(),
        });
    }

    std::fs::remove_file(path).map_err(|e| {
        tracing::warn!("Index updated but {} could not be removed: {}", filename, e);
        AppError::PartialDeletion {
            filename: filename.to_string(),
            detail: format!("index updated but the file could not be removed: {}", e),
        }
    })
}

fn warn_orphan_file(filename: &str, error: &AppError) {
    tracing::warn!(
        "{} stays on disk without index entries: {}",
        filename,
        error
    );
}
