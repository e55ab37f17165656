//! Document management command handler.

use clap::{Args, Subcommand};
use docrag_core::{config::AppConfig, AppResult};

/// List, locate and delete uploaded documents
#[derive(Args, Debug)]
pub struct DocsCommand {
    #[command(subcommand)]
    pub action: DocsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocsAction {
    /// List uploaded documents and their index status
    List(DocsListCommand),
    /// Remove a document generation from the index and the upload directory
    Delete(DocsDeleteCommand),
    /// Print the stored path of an uploaded file
    Path(DocsPathCommand),
}

impl DocsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            DocsAction::List(cmd) => cmd.execute(config).await,
            DocsAction::Delete(cmd) => cmd.execute(config).await,
            DocsAction::Path(cmd) => cmd.execute(config),
        }
    }
}

#[derive(Args, Debug)]
pub struct DocsListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocsListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Listing documents for {}", config.provider);

        let manager = super::open_manager(config)?;
        let documents = manager.list_documents(config.provider).await?;

        if self.json {
            return crate::print_json(&documents);
        }

        if documents.is_empty() {
            println!("No documents uploaded for {}", config.provider);
            return Ok(());
        }

        for doc in &documents {
            println!(
                "{:<40} {:<32} {:>10} {:>6} chunks  {}",
                doc.filename,
                doc.uploaded_at,
                doc.size_formatted.as_deref().unwrap_or("-"),
                doc.chunk_count,
                doc.status
            );
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DocsDeleteCommand {
    /// File name of the document
    pub filename: String,

    /// Generation to delete, as shown by `docs list`
    #[arg(long)]
    pub uploaded_at: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocsDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Deleting {} ({}) from {}",
            self.filename,
            self.uploaded_at,
            config.provider
        );

        let manager = super::open_manager(config)?;
        let report = manager
            .delete(&self.filename, &self.uploaded_at, config.provider)
            .await?;

        if self.json {
            return crate::print_json(&report);
        }

        println!(
            "Deleted {} ({} chunks removed)",
            report.filename, report.chunks_removed
        );
        if !report.file_removed {
            println!("Kept the stored file: it belongs to a newer upload");
        }
        if report.index_removed {
            println!("Index for {} is now empty and was removed", config.provider);
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DocsPathCommand {
    /// File name of the document
    pub filename: String,
}

impl DocsPathCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let manager = super::open_manager(config)?;
        let path = manager.document_path(&self.filename, config.provider)?;
        println!("{}", path.display());
        Ok(())
    }
}
