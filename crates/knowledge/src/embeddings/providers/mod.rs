//! Concrete embedding providers.

mod mock;
mod ollama;
mod openai;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
