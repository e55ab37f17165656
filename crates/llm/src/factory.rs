//! LLM provider factory.
//!
//! Builds the generation client for a provider from application
//! configuration. Clients are built once and shared via `Arc`.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use docrag_core::{AppConfig, AppError, AppResult, ProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client for the given provider.
///
/// # Errors
/// Returns `AppError::Config` if the hosted provider's API key is missing,
/// or `AppError::GenerationBackend` if the HTTP client cannot be built.
pub fn create_client(config: &AppConfig, provider: ProviderKind) -> AppResult<Arc<dyn LlmClient>> {
    match provider {
        ProviderKind::Ollama => {
            let settings = &config.ollama;
            let client = OllamaClient::new(
                settings.endpoint.clone(),
                settings.model.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        ProviderKind::OpenAi => {
            let settings = &config.openai;
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "OpenAI provider requires an API key in {}",
                    settings.api_key_env
                ))
            })?;
            let client = OpenAiClient::new(
                settings.endpoint.clone(),
                api_key,
                settings.model.clone(),
                settings.temperature,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let config = AppConfig::default();
        let client = create_client(&config, ProviderKind::Ollama).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.default_model(), "llama3.2:1b");
    }

    #[test]
    fn test_openai_requires_api_key() {
        let mut config = AppConfig::default();
        config.openai.api_key_env = "DOCRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        match create_client(&config, ProviderKind::OpenAi) {
            Err(err) => assert!(err.to_string().contains("requires an API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }
}
