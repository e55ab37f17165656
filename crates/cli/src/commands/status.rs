//! Status command handler.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};

/// Show index and storage status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let manager = super::open_manager(config)?;
        let status = manager.status(config.provider).await?;

        if self.json {
            return crate::print_json(&status);
        }

        println!("Provider:    {}", status.provider);
        println!("Model:       {} ({} dims)", status.model, status.dimensions);
        println!("Documents:   {}", status.document_count);
        println!("Chunks:      {}", status.chunk_count);
        println!("Index:       {}", status.store_path.display());
        println!("Uploads:     {}", status.upload_dir.display());

        Ok(())
    }
}
