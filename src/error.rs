use thiserror::Error;

/// Failure of one pass through the retrieval/generation chain. The HTTP layer
/// collapses every variant into the same apology but logs which stage failed.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("query is empty")]
    EmptyInput,
    #[error("embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),
    #[error("retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),
    #[error("generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),
}

impl ChainError {
    pub fn stage(&self) -> &'static str {
        match self {
            ChainError::EmptyInput => "input",
            ChainError::Embedding(_) => "embedding",
            ChainError::Retrieval(_) => "retrieval",
            ChainError::Generation(_) => "generation",
        }
    }
}
