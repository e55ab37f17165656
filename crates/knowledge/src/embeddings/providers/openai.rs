//! OpenAI embedding provider.
//!
//! Sends the whole batch in one `POST {endpoint}/embeddings` request and
//! restores input order from each item's `index`.

use super::ollama::check_dimensions;
use crate::embeddings::provider::EmbeddingProvider;
use async_trait::async_trait;
use docrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Inputs per request; larger batches are split.
const MAX_BATCH: usize = 256;

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::EmbeddingBackend(format!("Failed to create HTTP client for OpenAI: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        })
    }

    async fn embed_request(&self, input: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::EmbeddingBackend(format!("Failed to send request to OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::EmbeddingBackend(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingBackend(format!("Failed to parse OpenAI response: {}", e))
        })?;

        order_embeddings(body.data, input.len(), self.dimensions, &self.model)
    }
}

/// Place each returned item at its `index`, failing on gaps or wrong sizes.
fn order_embeddings(
    items: Vec<EmbeddingItem>,
    expected: usize,
    dimensions: usize,
    model: &str,
) -> AppResult<Vec<Vec<f32>>> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in items {
        check_dimensions(&item.embedding, dimensions, model)?;
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            AppError::EmbeddingBackend(format!("OpenAI returned out-of-range index {}", item.index))
        })?;
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| {
                AppError::EmbeddingBackend(format!("OpenAI returned no embedding for input {}", i))
            })
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!("Requesting {} embeddings from OpenAI", batch.len());
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, value: f32) -> EmbeddingItem {
        EmbeddingItem {
            index,
            embedding: vec![value; 2],
        }
    }

    #[test]
    fn test_order_embeddings_by_index() {
        let ordered = order_embeddings(vec![item(1, 1.0), item(0, 0.5)], 2, 2, "m").unwrap();
        assert_eq!(ordered, vec![vec![0.5, 0.5], vec![1.0, 1.0]]);
    }

    #[test]
    fn test_order_embeddings_missing_item() {
        let result = order_embeddings(vec![item(0, 0.5)], 2, 2, "m");
        assert!(matches!(result, Err(AppError::EmbeddingBackend(_))));
    }

    #[test]
    fn test_order_embeddings_wrong_dimensions() {
        let result = order_embeddings(vec![item(0, 0.5)], 1, 3, "m");
        assert!(matches!(result, Err(AppError::EmbeddingBackend(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenAiProvider::new(
            "https://api.openai.com/v1",
            "sk-secret",
            "text-embedding-3-small",
            1536,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!format!("{:?}", provider).contains("sk-secret"));
    }
}
