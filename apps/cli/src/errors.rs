use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::llm_client::LlmError;
use crate::vector_store::VectorStoreError;

/// Application-level error type. Every step returns `Result<T, AppError>`;
/// `main` prints the chain and exits non-zero on failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Document error: {0}")]
    Document(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
