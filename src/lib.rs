pub mod chain;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod huggingface;
pub mod ingest;
pub mod models;
pub mod pinecone_store;
pub mod prompt;
pub mod retrieval;
pub mod server;

pub use config::AppConfig;
pub use server::run_server;
