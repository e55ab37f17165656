//! Generation backend implementations.

mod lines;
mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
