//! docrag Core Library
//!
//! This crate provides the foundational utilities shared by the docrag crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management and provider selection

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ProviderKind};
pub use error::{AppError, AppResult};
