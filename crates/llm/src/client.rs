//! Generation client abstraction.
//!
//! A request is one self-contained prompt: the retrieved context travels in
//! the system prompt and the user's question in `prompt`. Nothing is kept
//! between requests.

use docrag_core::AppResult;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// One generation call.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// The user's question
    pub prompt: String,

    pub model: String,

    /// Grounding instructions and retrieved context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    pub stream: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            temperature: None,
            stream: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Token counts reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A finished, non-streamed answer.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: LlmUsage,

    /// False when the backend stopped before a natural end (e.g. a length cap)
    pub done: bool,
}

/// An incremental piece of a streamed answer.
#[derive(Debug, Clone)]
pub struct LlmStreamChunk {
    pub content: String,
    pub model: String,
    pub done: bool,

    /// Only present on the final chunk, and only when the backend reports it
    pub usage: Option<LlmUsage>,
}

pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// A generation backend.
///
/// One client is built per provider at startup and shared across requests.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Model used when the caller has no preference.
    fn default_model(&self) -> &str;

    /// Sampling temperature used when the caller has no preference.
    fn default_temperature(&self) -> Option<f32> {
        None
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}
