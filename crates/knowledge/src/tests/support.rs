//! Test doubles shared by the scenario tests.

use crate::embeddings::EmbeddingProvider;
use crate::lifecycle::DocumentManager;
use crate::loader::{split_text, DocumentLoader};
use crate::provider::ProviderContext;
use crate::types::{Chunk, ChunkMetadata};
use docrag_core::{AppConfig, AppError, AppResult, ProviderKind};
use docrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Embeds text as keyword counts over a fixed vocabulary.
///
/// Dimension `i` counts occurrences of `vocabulary[i]`, so tests can
/// predict similarities exactly.
#[derive(Debug)]
pub struct KeywordProvider {
    vocabulary: Vec<&'static str>,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    failing: AtomicBool,
}

impl KeywordProvider {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn standard() -> Self {
        Self::new(&[
            "alpha", "beta", "gamma", "delta", "refund", "shipping", "warranty", "invoice",
        ])
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keywords-v1"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::EmbeddingBackend("connection refused".to_string()));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Loads UTF-8 text files, so scenarios don't need real PDFs.
pub struct TextLoader {
    chunk_size: usize,
}

impl TextLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

#[async_trait::async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path, uploaded_at: &str) -> AppResult<Vec<Chunk>> {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let text = tokio::fs::read_to_string(path).await?;
        let chunks = split_text(&text, &source, uploaded_at, self.chunk_size, 0)?;
        if chunks.is_empty() {
            return Err(AppError::NoExtractableText(source));
        }
        Ok(chunks)
    }
}

/// LLM double that records requests and echoes the question.
#[derive(Default)]
pub struct FakeLlm {
    pub last_request: Mutex<Option<LlmRequest>>,
    pub failing: AtomicBool,
}

impl FakeLlm {
    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_request
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|r| r.system.clone())
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Other("model unavailable".to_string()));
        }
        Ok(LlmResponse {
            content: format!("Answer to: {}", request.prompt),
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        let model = request.model.clone();
        let pieces = ["Answer", " streamed"];
        let chunks: Vec<AppResult<LlmStreamChunk>> = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                Ok(LlmStreamChunk {
                    content: piece.to_string(),
                    model: model.clone(),
                    done: i + 1 == pieces.len(),
                    usage: None,
                })
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// A workspace in a temp dir with one or more providers registered.
pub struct Harness {
    pub temp: TempDir,
    pub config: AppConfig,
    pub manager: DocumentManager,
    pub embedder: Arc<KeywordProvider>,
    pub llm: Arc<FakeLlm>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_providers(&[ProviderKind::Ollama])
    }

    pub fn with_providers(kinds: &[ProviderKind]) -> Self {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        };
        let embedder = Arc::new(KeywordProvider::standard());
        let llm = Arc::new(FakeLlm::default());

        let mut manager = DocumentManager::new(Arc::new(TextLoader::new(1000)));
        for &kind in kinds {
            let context = ProviderContext::with_embedder(kind, embedder.clone(), &config).unwrap();
            manager.register(context, llm.clone()).unwrap();
        }

        Self {
            temp,
            config,
            manager,
            embedder,
            llm,
        }
    }

    /// Register the same workspace again, as a restarted process would.
    pub fn reopen(&self) -> DocumentManager {
        let mut manager = DocumentManager::new(Arc::new(TextLoader::new(1000)));
        let context =
            ProviderContext::with_embedder(ProviderKind::Ollama, self.embedder.clone(), &self.config)
                .unwrap();
        manager.register(context, self.llm.clone()).unwrap();
        manager
    }

    pub fn upload_path(&self, kind: ProviderKind, filename: &str) -> std::path::PathBuf {
        self.config.upload_dir(kind).join(filename)
    }

    pub fn store_path(&self, kind: ProviderKind) -> std::path::PathBuf {
        self.config.vector_store_path(kind)
    }
}

pub fn chunk(source: &str, uploaded_at: &str, content: &str) -> Chunk {
    Chunk::new(content, ChunkMetadata::new(source, uploaded_at, 0))
}

/// Let the filesystem clock move on so a rewritten file gets a new mtime.
pub async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
