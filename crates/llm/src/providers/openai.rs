//! OpenAI chat completions provider.
//!
//! Talks to `POST {endpoint}/chat/completions` with bearer authentication.
//! Any OpenAI-compatible endpoint works as long as it accepts the same
//! request shape.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use super::lines::parse_body;
use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatStreamEvent {
    model: String,
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client for an OpenAI-compatible endpoint.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::GenerationBackend(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client,
        })
    }

    fn to_chat_request(&self, request: &LlmRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            stream,
        }
    }

    async fn post_chat(&self, body: &ChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::GenerationBackend(format!("Failed to send request to OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::GenerationBackend(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

/// Parse server-sent events (`data: {...}` lines) into stream chunks.
fn parse_sse_lines(text: &str) -> Vec<AppResult<LlmStreamChunk>> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .map(str::trim)
        .filter(|payload| !payload.is_empty() && *payload != "[DONE]")
        .map(|payload| {
            let event: ChatStreamEvent = serde_json::from_str(payload).map_err(|e| {
                AppError::GenerationBackend(format!("Failed to parse stream event: {}", e))
            })?;

            let choice = event.choices.into_iter().next();
            let done = choice
                .as_ref()
                .map(|c| c.finish_reason.is_some())
                .unwrap_or(false);
            let content = choice.and_then(|c| c.delta.content).unwrap_or_default();

            Ok(LlmStreamChunk {
                content,
                model: event.model,
                done,
                usage: None,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_temperature(&self) -> Option<f32> {
        Some(self.temperature)
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to OpenAI (model: {})", request.model);

        let body = self.to_chat_request(request, false);
        let response = self.post_chat(&body).await?;

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::GenerationBackend(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let usage = chat
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let choice = chat.choices.into_iter().next().ok_or_else(|| {
            AppError::GenerationBackend("OpenAI response contained no choices".to_string())
        })?;

        tracing::info!("Received completion from OpenAI");

        Ok(LlmResponse {
            content: choice.message.content,
            model: chat.model,
            usage,
            done: choice.finish_reason.is_some(),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to OpenAI (model: {})", request.model);

        let body = self.to_chat_request(request, true);
        let response = self.post_chat(&body).await?;

        Ok(parse_body(response.bytes_stream(), parse_sse_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            "https://api.openai.com/v1/",
            "sk-test",
            "gpt-4o-mini",
            0.7,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_chat_request_includes_system_message() {
        let request = LlmRequest::new("What is page 2 about?", "gpt-4o-mini")
            .with_system("Answer from context");

        let body = client().to_chat_request(&request, false);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].role, "user");
        assert_eq!(body.messages[1].content, "What is page 2 about?");
        assert!(!body.stream);
    }

    #[test]
    fn test_defaults() {
        let client = client();
        assert_eq!(client.base_url, "https://api.openai.com/v1");
        assert_eq!(client.default_model(), "gpt-4o-mini");
        assert_eq!(client.default_temperature(), Some(0.7));
    }

    #[test]
    fn test_parse_sse_lines() {
        let body = concat!(
            "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        );

        let chunks: Vec<_> = parse_sse_lines(body)
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Hi");
        assert!(!chunks[0].done);
        assert!(chunks[1].done);
        assert!(chunks[1].content.is_empty());
    }

    #[test]
    fn test_sse_event_split_across_reads() {
        let event = "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{\"content\":\"Zo\u{eb}\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = event.as_bytes();
        let reads: Vec<Result<Vec<u8>, String>> =
            vec![Ok(bytes[..30].to_vec()), Ok(bytes[30..].to_vec())];

        let chunks = futures::executor::block_on(futures::StreamExt::collect::<Vec<_>>(
            parse_body(futures::stream::iter(reads), parse_sse_lines),
        ));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().content, "Zo\u{eb}");
    }
}
