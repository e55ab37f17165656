//! Deterministic offline embedder.

use crate::embeddings::provider::EmbeddingProvider;
use docrag_core::AppResult;
use std::collections::HashMap;

/// Offline provider producing content-dependent vectors.
///
/// Each lowercase word longer than two characters is hashed into one
/// bucket, and each of its character trigrams into another. The vector is
/// L2-normalized, so texts sharing vocabulary score high under cosine
/// similarity. Used by tests and local development; never persisted
/// alongside a real provider's index.
#[derive(Debug, Clone)]
pub struct MockProvider {
    dimensions: usize,
    model: String,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: "hashed-trigram".to_string(),
        }
    }

    /// Use a different model label. Indexes record the label, so this is how
    /// tests simulate a model change between save and load.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn bucket(&self, token: &str, seed: u64) -> usize {
        let hash = token
            .bytes()
            .fold(seed, |acc, b| (acc ^ b as u64).wrapping_mul(0x100_0000_01b3));
        (hash % self.dimensions.max(1) as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let lower = text.to_lowercase();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
        {
            *counts.entry(word).or_default() += 1;
        }

        for (word, count) in counts {
            let weight = count as f32;
            vector[self.bucket(word, 0xcbf2_9ce4_8422_2325)] += weight;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(&trigram, 0x8422_2325_cbf2_9ce4)] += weight.sqrt() * 0.5;
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
