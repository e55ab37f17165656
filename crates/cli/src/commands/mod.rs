//! Command handlers for the docrag CLI.

pub mod ask;
pub mod docs;
pub mod ingest;
pub mod status;

pub use ask::AskCommand;
pub use docs::DocsCommand;
pub use ingest::IngestCommand;
pub use status::StatusCommand;

use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::DocumentManager;

/// Open a manager for the configured provider only.
pub(crate) fn open_manager(config: &AppConfig) -> AppResult<DocumentManager> {
    DocumentManager::open(config, &[config.provider])
}
