use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct PineconeConfig {
    pub api_key: String,
    pub control_url: String,
    pub index_name: String,
    /// Skips the describe-index lookup when set.
    pub index_host: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HuggingFaceConfig {
    pub api_token: String,
    pub inference_url: String,
    pub embedding_model: String,
    pub answer_model: String,
}

#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_new_tokens: usize,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub upsert_batch_size: usize,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub static_dir: PathBuf,
    pub top_k: usize,
    pub http_timeout: Duration,
    pub pinecone: PineconeConfig,
    pub huggingface: HuggingFaceConfig,
    pub generation: GenerationConfig,
    pub chunking: ChunkingConfig,
}

impl AppConfig {
    /// Loads `.env` (if any) and reads the process environment. Fails when either
    /// upstream credential is absent.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_process_env()
    }

    fn from_process_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env::var("MEDIBOT_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            static_dir: env::var("MEDIBOT_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            top_k: parse_or("RETRIEVER_TOP_K", 3),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 120)),
            pinecone: PineconeConfig {
                api_key: required("PINECONE_API_KEY")?,
                control_url: env::var("PINECONE_CONTROL_URL")
                    .unwrap_or_else(|_| "https://api.pinecone.io".to_string()),
                index_name: env::var("PINECONE_INDEX_NAME")
                    .unwrap_or_else(|_| "medicalbot".to_string()),
                index_host: optional("PINECONE_INDEX_HOST"),
                namespace: optional("PINECONE_NAMESPACE"),
            },
            huggingface: HuggingFaceConfig {
                api_token: required("HUGGINGFACEHUB_API_TOKEN")?,
                inference_url: env::var("HUGGINGFACE_INFERENCE_URL")
                    .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
                answer_model: env::var("ANSWER_MODEL")
                    .unwrap_or_else(|_| "mistralai/Mistral-7B-Instruct-v0.3".to_string()),
            },
            generation: GenerationConfig {
                temperature: parse_or("GENERATION_TEMPERATURE", 0.4),
                max_new_tokens: parse_or("GENERATION_MAX_NEW_TOKENS", 300),
                top_p: parse_or("GENERATION_TOP_P", 0.85),
                repetition_penalty: parse_or("GENERATION_REPETITION_PENALTY", 1.1),
            },
            chunking: ChunkingConfig::from_env(),
        })
    }
}

impl ChunkingConfig {
    pub fn from_env() -> Self {
        Self {
            chunk_size: parse_or("CHUNK_SIZE", 500),
            chunk_overlap: parse_or("CHUNK_OVERLAP", 20),
            upsert_batch_size: parse_or("UPSERT_BATCH_SIZE", 64),
        }
    }
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("missing required environment variable {key}"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
