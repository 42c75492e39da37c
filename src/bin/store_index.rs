use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use medibot::config::{AppConfig, ChunkingConfig};
use medibot::huggingface::HuggingFaceClient;
use medibot::ingest::{discover_sources, load_chunks, Ingestor};
use medibot::pinecone_store::PineconeStore;

#[derive(Parser, Debug)]
#[command(name = "store_index")]
#[command(about = "Split medical reference documents and store their embeddings in Pinecone")]
struct Cli {
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Only report how many chunks would be written.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.dry_run {
        let _ = dotenvy::dotenv();
        let files = discover_sources(&cli.data_dir)?;
        let chunks = load_chunks(&files, &ChunkingConfig::from_env()).await?;
        println!(
            "Dry run. files={} chunks={}",
            files.len(),
            chunks.len()
        );
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let huggingface = HuggingFaceClient::new(
        config.huggingface.inference_url.clone(),
        config.huggingface.api_token.clone(),
        config.http_timeout,
    )?;
    let pinecone = PineconeStore::connect(&config.pinecone, config.http_timeout).await?;

    let ingestor = Ingestor::new(
        config.chunking.clone(),
        huggingface,
        pinecone,
        config.huggingface.embedding_model.clone(),
    );
    let result = ingestor.ingest(&cli.data_dir).await?;

    println!(
        "Ingest complete. files={} chunks={} upserted={}",
        result.file_count, result.chunk_count, result.upserted_count
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
