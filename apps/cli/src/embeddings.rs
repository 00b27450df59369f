//! OpenAI embeddings client.
//!
//! All embedding calls go through this module. The model and batch size are
//! hardcoded: the persistent collection is 1536-dimensional and was never
//! migrated, so the model must not drift.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
/// The embedding model behind the `jds` collection (1536 dimensions).
pub const EMBED_MODEL: &str = "text-embedding-ada-002";
/// Maximum inputs per embeddings request.
pub const EMBED_BATCH_SIZE: usize = 100;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("API returned {got} embeddings for {expected} inputs")]
    CountMismatch { got: usize, expected: usize },

    #[error("Batch of {0} exceeds maximum of {EMBED_BATCH_SIZE}")]
    BatchTooLarge(usize),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

/// Async embeddings client with bounded retry on rate limits and 5xx.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
}

impl EmbeddingClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Embeds a batch of at most [`EMBED_BATCH_SIZE`] inputs, returning
    /// vectors in input order.
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > EMBED_BATCH_SIZE {
            return Err(EmbeddingError::BatchTooLarge(inputs.len()));
        }

        let request_body = EmbeddingRequest {
            model: EMBED_MODEL,
            input: inputs,
        };

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, body);
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let mut parsed: EmbeddingResponse = response.json().await?;
            parsed.data.sort_by_key(|entry| entry.index);
            if parsed.data.len() != inputs.len() {
                return Err(EmbeddingError::CountMismatch {
                    got: parsed.data.len(),
                    expected: inputs.len(),
                });
            }

            debug!(batch = inputs.len(), "embedded batch");
            return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
        }

        Err(last_error.unwrap_or(EmbeddingError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Embeds a single query string.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[input]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            got: 0,
            expected: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let client = EmbeddingClient::new("test-key".to_string());
        let vectors = client.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_before_any_call() {
        let client = EmbeddingClient::new("test-key".to_string());
        let inputs: Vec<String> = (0..EMBED_BATCH_SIZE + 1).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
        match client.embed_batch(&refs).await {
            Err(EmbeddingError::BatchTooLarge(n)) => assert_eq!(n, EMBED_BATCH_SIZE + 1),
            other => panic!("expected BatchTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_request_serializes_model_and_input() {
        let body = EmbeddingRequest {
            model: EMBED_MODEL,
            input: &["a", "b"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "text-embedding-ada-002");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_response_entries_sort_by_index() {
        let json = r#"{"data": [
            {"index": 1, "embedding": [1.0]},
            {"index": 0, "embedding": [0.0]}
        ]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        parsed.data.sort_by_key(|e| e.index);
        assert_eq!(parsed.data[0].embedding, vec![0.0]);
        assert_eq!(parsed.data[1].embedding, vec![1.0]);
    }
}
