//! Qdrant REST client for the persistent job-description collection.
//!
//! The collection is created exactly once with 1536-dimensional vectors and
//! cosine distance; an existing collection is never altered. Point ids are
//! UUIDv5 of `doc_id#chunk_index`, so re-indexing a document overwrites its
//! chunks in place instead of appending duplicates.

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EMBEDDING_DIM;
use crate::documents::Chunk;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Qdrant error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid Qdrant configuration: {0}")]
    Config(String),

    #[error("Chunk count {chunks} does not match vector count {vectors}")]
    LengthMismatch { chunks: usize, vectors: usize },
}

/// One point to upsert: a chunk plus its embedding.
#[derive(Debug, Serialize)]
struct Point {
    id: Uuid,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub indexed_at: chrono::DateTime<Utc>,
}

/// A retrieved chunk, ranked by similarity.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: ChunkPayload,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f32,
    payload: ChunkPayload,
}

/// REST client scoped to one named collection.
#[derive(Clone, Debug)]
pub struct VectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl VectorStore {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        collection: &str,
    ) -> Result<Self, VectorStoreError> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(VectorStoreError::Config(
                "QDRANT_URL must be an http(s) URL".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key.trim())
                .map_err(|_| VectorStoreError::Config("invalid Qdrant API key".to_string()))?;
            headers.insert("api-key", value);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Creates the collection (1536 / cosine) iff it does not already
    /// exist. An existing collection is left untouched.
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let response = self.client.get(self.collection_url()).send().await?;

        match response.status().as_u16() {
            200 => {
                debug!(collection = %self.collection, "collection already exists");
                return Ok(());
            }
            404 => {}
            status => {
                let message = response.text().await.unwrap_or_default();
                return Err(VectorStoreError::Api { status, message });
            }
        }

        let body = json!({
            "vectors": {
                "size": EMBEDDING_DIM,
                "distance": "Cosine",
            }
        });
        let response = self
            .client
            .put(self.collection_url())
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;

        info!(
            collection = %self.collection,
            dim = EMBEDDING_DIM,
            "created collection (cosine)"
        );
        Ok(())
    }

    /// Upserts chunks with their embeddings. `wait=true` so a success means
    /// the points are durable before the next batch starts.
    pub async fn upsert(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), VectorStoreError> {
        if chunks.len() != vectors.len() {
            return Err(VectorStoreError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let indexed_at = Utc::now();
        let points: Vec<Point> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| Point {
                id: point_id(&chunk.doc_id, chunk.chunk_index),
                vector,
                payload: ChunkPayload {
                    doc_id: chunk.doc_id.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    indexed_at,
                },
            })
            .collect();

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        check_status(response).await?;

        debug!(count = chunks.len(), "upserted points");
        Ok(())
    }

    /// Nearest-neighbor search, returning payloads with scores.
    pub async fn search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredChunk {
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, VectorStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(VectorStoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Deterministic point id keyed on document id and chunk index.
pub fn point_id(doc_id: &str, chunk_index: usize) -> Uuid {
    let key = format!("{doc_id}#{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}
