//! Indexing pipeline: load PDFs, chunk, embed, upsert.
//!
//! Batches are upserted as they are embedded; a failure mid-run leaves the
//! earlier batches committed (no partial-commit guarantee).

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::documents::{self, Chunk};
use crate::embeddings::{EmbeddingClient, EMBED_BATCH_SIZE};
use crate::errors::AppError;
use crate::vector_store::VectorStore;

/// Summary statistics for one indexing run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub duration_ms: u128,
}

pub struct Indexer<'a> {
    embedder: &'a EmbeddingClient,
    store: &'a VectorStore,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a EmbeddingClient, store: &'a VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Indexes every PDF in `dir` into the persistent collection.
    pub async fn index_dir(&self, dir: &Path) -> Result<IndexStats, AppError> {
        let docs = documents::load_dir(dir)?;
        self.index_documents(docs).await
    }

    /// Indexes a single PDF file.
    pub async fn index_file(&self, path: &Path) -> Result<IndexStats, AppError> {
        let doc = documents::load_file(path)?;
        self.index_documents(vec![doc]).await
    }

    async fn index_documents(
        &self,
        docs: Vec<documents::Document>,
    ) -> Result<IndexStats, AppError> {
        let started = Instant::now();

        let chunks: Vec<Chunk> = docs.iter().flat_map(documents::chunk).collect();
        info!(documents = docs.len(), chunks = chunks.len(), "indexing");

        self.store.ensure_collection().await?;

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            self.store.upsert(batch, vectors).await?;
        }

        let stats = IndexStats {
            documents: docs.len(),
            chunks: chunks.len(),
            duration_ms: started.elapsed().as_millis(),
        };
        info!(
            documents = stats.documents,
            chunks = stats.chunks,
            duration_ms = stats.duration_ms,
            "indexing complete"
        );
        Ok(stats)
    }
}
