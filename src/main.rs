use anyhow::Result;
use tracing_subscriber::EnvFilter;

use medibot::chain::RagChain;
use medibot::cleaner::ResponseCleaner;
use medibot::huggingface::HuggingFaceClient;
use medibot::pinecone_store::PineconeStore;
use medibot::prompt::PromptTemplate;
use medibot::retrieval::Retriever;
use medibot::server::AppState;
use medibot::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;

    let huggingface = HuggingFaceClient::new(
        config.huggingface.inference_url.clone(),
        config.huggingface.api_token.clone(),
        config.http_timeout,
    )?;
    let pinecone = PineconeStore::connect(&config.pinecone, config.http_timeout).await?;
    tracing::info!(
        index = %config.pinecone.index_name,
        host = %pinecone.host(),
        "connected to pinecone index"
    );

    let retriever = Retriever::new(
        huggingface.clone(),
        pinecone,
        config.huggingface.embedding_model.clone(),
        config.top_k,
    );

    let chain = RagChain::new(
        retriever,
        PromptTemplate::medical()?,
        huggingface,
        config.huggingface.answer_model.clone(),
        config.generation.clone(),
    );

    let state = AppState {
        chain,
        cleaner: ResponseCleaner::medical()?,
    };

    run_server(config, state).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
