//! Error types for docrag.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! provider backends, and the document lifecycle. The lifecycle variants
//! mirror the outcomes callers need to tell apart: nothing ingested yet,
//! empty documents, and deletions that left the index and the upload
//! directory out of step.

use thiserror::Error;

/// Unified error type for docrag.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic: errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider id outside the supported set
    #[error("Unknown provider: '{0}'. Supported providers: ollama, openai")]
    UnknownProvider(String),

    /// The loader produced no chunks for a document
    #[error("No extractable text found in '{0}'")]
    NoExtractableText(String),

    /// An index was requested from zero chunks
    #[error("Cannot build a vector index from zero chunks")]
    EmptyInput,

    /// Query or delete against a provider with no ingested documents
    #[error("No documents ingested yet for provider '{0}'")]
    IndexNotFound(String),

    /// Delete target is present in neither the index nor the upload directory
    #[error("Document '{filename}' uploaded at {uploaded_at} not found")]
    DocumentNotFound {
        filename: String,
        uploaded_at: String,
    },

    /// No stored upload with this name
    #[error("Document file '{0}' not found")]
    FileNotFound(String),

    /// Filename would resolve outside the provider's upload directory
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Embedding backend failures (network, auth, malformed responses)
    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// Generation backend failures
    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    /// The index and the upload directory no longer agree after a delete
    #[error("Partial deletion of '{filename}': {detail}")]
    PartialDeletion { filename: String, detail: String },

    /// On-disk index errors (corrupt, inconsistent, mismatched provider)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error describes a problem with the caller's request
    /// rather than a fault in the service.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::UnknownProvider(_)
                | AppError::NoExtractableText(_)
                | AppError::IndexNotFound(_)
                | AppError::DocumentNotFound { .. }
                | AppError::FileNotFound(_)
                | AppError::AccessDenied(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
