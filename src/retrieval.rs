use crate::error::ChainError;
use crate::huggingface::HuggingFaceClient;
use crate::models::{RetrievedChunk, TEXT_METADATA_KEY};
use crate::pinecone_store::{PineconeStore, VectorMatch};

/// Similarity retriever over the Pinecone index: embed the query, take the
/// `top_k` nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    huggingface: HuggingFaceClient,
    pinecone: PineconeStore,
    embedding_model: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        huggingface: HuggingFaceClient,
        pinecone: PineconeStore,
        embedding_model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            huggingface,
            pinecone,
            embedding_model: embedding_model.into(),
            top_k,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, ChainError> {
        let embedding = self
            .huggingface
            .embed(&self.embedding_model, query)
            .await
            .map_err(ChainError::Embedding)?;

        let matches = self
            .pinecone
            .query(&embedding, self.top_k)
            .await
            .map_err(ChainError::Retrieval)?;

        let chunks: Vec<RetrievedChunk> = matches.into_iter().filter_map(into_chunk).collect();
        tracing::debug!(count = chunks.len(), "retrieved context chunks");
        for chunk in &chunks {
            tracing::debug!(
                id = %chunk.id,
                score = chunk.score,
                source = chunk.source().unwrap_or("-"),
                page = ?chunk.page(),
                "context chunk"
            );
        }
        Ok(chunks)
    }
}

fn into_chunk(hit: VectorMatch) -> Option<RetrievedChunk> {
    let mut metadata = hit.metadata;
    let text = match metadata.remove(TEXT_METADATA_KEY) {
        Some(serde_json::Value::String(text)) => text,
        _ => {
            tracing::warn!(id = %hit.id, "skipping match without text metadata");
            return None;
        }
    };

    Some(RetrievedChunk {
        id: hit.id,
        text,
        score: hit.score,
        metadata,
    })
}
