use std::path::Path;

use anyhow::{Context, Result};

/// Path of the secrets file loaded before reading the environment.
pub const SECRETS_FILE: &str = "secrets/keys.env";

/// Storage prefix holding job description PDFs.
pub const JDS_PREFIX: &str = "jds";
/// Storage prefix holding candidate résumé PDFs.
pub const CVS_PREFIX: &str = "cvs";
/// Storage prefix holding scraper output CSVs.
pub const SCRAPED_PREFIX: &str = "scraped";
/// File stem of the filtered jobs CSV produced upstream.
pub const FILTERED_CSV_STEM: &str = "jobs_filtered";
/// Storage prefix (and local directory) for recommendation results.
pub const UPLOAD_PREFIX: &str = "job_recommend";

/// Name of the persistent job-description vector collection.
pub const COLLECTION_NAME: &str = "jds";
/// Embedding dimensionality of the collection. Never migrated.
pub const EMBEDDING_DIM: usize = 1536;
/// Number of chunks retrieved per sub-question.
pub const TOP_K: usize = 3;

/// Application configuration loaded from environment variables.
/// Loading fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai_api_key: String,
    pub qdrant_url: String,
    /// Optional: local Qdrant deployments run without an API key.
    pub qdrant_api_key: Option<String>,
    pub anthropic_api_key: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        load_secrets();

        Ok(Config {
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            qdrant_url: require_env("QDRANT_URL")?,
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok(),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Loads `secrets/keys.env` (when present) and any local `.env` into the
/// process environment. Variables already set keep their values.
pub fn load_secrets() {
    // Fixed secrets path; ignore if missing and fall back to the ambient env.
    if Path::new(SECRETS_FILE).exists() {
        dotenvy::from_path(SECRETS_FILE).ok();
    }
    dotenvy::dotenv().ok();
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
