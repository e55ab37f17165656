//! Embedding providers.
//!
//! One provider is built per [`ProviderKind`](docrag_core::ProviderKind);
//! the vectors each produces only ever land in that provider's index.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::MockProvider;
