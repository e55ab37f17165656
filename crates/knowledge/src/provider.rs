//! Provider resolution.
//!
//! Maps a [`ProviderKind`] to its embedder and its storage namespace. Each
//! provider owns a separate upload directory and vector store path; nothing
//! is ever shared between them.

use crate::embeddings::{create_provider, EmbeddingProvider};
use docrag_core::{AppConfig, AppResult, ProviderKind};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything needed to operate on one provider's documents.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub kind: ProviderKind,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store_path: PathBuf,
    pub upload_dir: PathBuf,
}

impl ProviderContext {
    /// Build a context around an existing embedder, creating the upload
    /// directory if needed.
    pub fn with_embedder(
        kind: ProviderKind,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let upload_dir = config.upload_dir(kind);
        std::fs::create_dir_all(&upload_dir)?;

        Ok(Self {
            kind,
            embedder,
            store_path: config.vector_store_path(kind),
            upload_dir,
        })
    }
}

/// Resolve a provider into its context.
///
/// The only side effect is creating the upload directory. The vector store
/// directory appears on first save.
pub fn resolve(kind: ProviderKind, config: &AppConfig) -> AppResult<ProviderContext> {
    let embedder = create_provider(config, kind)?;
    tracing::debug!(
        "Resolved provider {} (embedder {}, {} dims)",
        kind,
        embedder.model_name(),
        embedder.dimensions()
    );
    ProviderContext::with_embedder(kind, embedder, config)
}

/// Resolve a provider from its textual id.
///
/// # Errors
/// `UnknownProvider` for ids outside the supported set.
pub fn resolve_id(id: &str, config: &AppConfig) -> AppResult<ProviderContext> {
    resolve(id.parse()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::AppError;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> AppConfig {
        AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_resolve_creates_only_upload_dir() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let context = resolve(ProviderKind::Ollama, &config).unwrap();
        assert_eq!(context.kind, ProviderKind::Ollama);
        assert!(context.upload_dir.is_dir());
        assert!(context.upload_dir.ends_with("uploads/ollama"));
        assert!(context.store_path.ends_with("vector_store/ollama"));
        assert!(!context.store_path.exists());
    }

    #[test]
    fn test_resolve_id_unknown() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let err = resolve_id("cohere", &config).unwrap_err();
        assert!(matches!(err, AppError::UnknownProvider(_)));
    }

    #[test]
    fn test_resolve_id_alias() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let context = resolve_id("local", &config).unwrap();
        assert_eq!(context.kind, ProviderKind::Ollama);
    }
}
