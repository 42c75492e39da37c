use serde::Deserialize;
use serde_json::{Map, Value};

/// Metadata key holding the chunk's passage text in the vector index.
pub const TEXT_METADATA_KEY: &str = "text";

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl RetrievedChunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }

    pub fn page(&self) -> Option<i64> {
        self.metadata.get("page").and_then(|v| v.as_i64())
    }
}

#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub input: String,
    pub context: Vec<RetrievedChunk>,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub msg: Option<String>,
}

/// A passage ready to be embedded and written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    pub source: String,
    pub page: Option<i64>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub source: String,
    pub page: Option<i64>,
    pub content: String,
}
