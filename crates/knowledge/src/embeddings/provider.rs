//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, OpenAiProvider};
use docrag_core::{AppConfig, AppError, AppResult, ProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
///
/// Vectors from different providers live in different spaces and must never
/// be stored in, or queried against, the same index.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::EmbeddingBackend("No embedding returned".to_string()))
    }
}

/// Create the embedding provider for a provider kind.
///
/// No network traffic happens here; backends are contacted on first use.
pub fn create_provider(
    config: &AppConfig,
    provider: ProviderKind,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider {
        ProviderKind::Ollama => {
            let settings = &config.ollama;
            let provider = OllamaProvider::new(
                settings.endpoint.clone(),
                settings.embedding_model.clone(),
                settings.embedding_dimensions,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
        ProviderKind::OpenAi => {
            let settings = &config.openai;
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "OpenAI embeddings require an API key in {}",
                    settings.api_key_env
                ))
            })?;
            let provider = OpenAiProvider::new(
                settings.endpoint.clone(),
                api_key,
                settings.embedding_model.clone(),
                settings.embedding_dimensions,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let config = AppConfig::default();
        let provider = create_provider(&config, ProviderKind::Ollama).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = AppConfig::default();
        config.openai.api_key_env = "DOCRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let result = create_provider(&config, ProviderKind::OpenAi);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = super::super::providers::MockProvider::new(64);
        let embedding = provider.embed("quarterly revenue report").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
