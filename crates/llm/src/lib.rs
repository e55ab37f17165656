//! LLM integration crate for docrag.
//!
//! This crate provides a provider-agnostic abstraction for the generation
//! step of retrieval-augmented answering.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Hosted chat completions API
//!
//! # Example
//! ```no_run
//! use docrag_core::{AppConfig, ProviderKind};
//! use docrag_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> docrag_core::AppResult<()> {
//! let config = AppConfig::default();
//! let client = create_client(&config, ProviderKind::Ollama)?;
//! let request = LlmRequest::new("Hello, world!", client.default_model());
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
