//! Ask command handler.
//!
//! Retrieves the closest chunks for a question and has the provider's
//! model answer from them.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::rag::RagSourceRef;
use futures::StreamExt;
use std::io::Write;

/// Ask a question about the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Print the answer as it is generated
    #[arg(long, conflicts_with = "json")]
    pub stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let manager = super::open_manager(config)?;

        if self.stream {
            return self.execute_stream(&manager, config).await;
        }

        let response = manager
            .query(&self.question, config.provider, self.top_k)
            .await?;

        tracing::debug!(
            "RAG response: max_score={:?}, sources_count={}",
            response.max_score(),
            response.sources.len()
        );

        if self.json {
            return crate::print_json(&response);
        }

        println!("Answer:");
        println!("{}", response.answer);
        println!();
        print_sources(&response.sources);

        Ok(())
    }

    async fn execute_stream(
        &self,
        manager: &docrag_knowledge::DocumentManager,
        config: &AppConfig,
    ) -> AppResult<()> {
        let (mut stream, chunks) = manager
            .query_stream(&self.question, config.provider, self.top_k)
            .await?;

        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            print!("{}", chunk.content);
            stdout.flush()?;
            if chunk.done {
                break;
            }
        }
        println!();
        println!();

        let sources = docrag_knowledge::rag::map_chunks_to_sources(&chunks);
        print_sources(&sources);

        Ok(())
    }
}

fn print_sources(sources: &[RagSourceRef]) {
    if sources.is_empty() {
        println!("Sources: (no sources available)");
        return;
    }

    println!("Sources:");
    for source in sources {
        println!("- {} (uploaded {})", source.source, source.uploaded_at);
    }
}
