//! Ingest command handler.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Upload and index PDF files
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// PDF files to ingest
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} file(s)", self.files.len());

        let manager = super::open_manager(config)?;

        let mut reports = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let report = manager.ingest_file(file, config.provider).await?;
            if !self.json {
                println!(
                    "Ingested {} ({} chunks, uploaded at {})",
                    report.filename, report.chunk_count, report.uploaded_at
                );
            }
            reports.push(report);
        }

        if self.json {
            crate::print_json(&reports)?;
        }

        Ok(())
    }
}
