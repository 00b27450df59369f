//! Recommendation engine.
//!
//! Two queryable tools — the persistent JD collection and an ephemeral
//! in-memory index over one résumé — are exposed to a sub-question engine:
//! the composed question is decomposed by the LLM, each sub-question is
//! answered by its routed tool over retrieved context, and a final
//! synthesis call produces the answer written to
//! `job_recommend/{id}_recommended.txt`.

pub mod prompts;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{CVS_PREFIX, TOP_K, UPLOAD_PREFIX};
use crate::documents::{self, Chunk};
use crate::embeddings::EmbeddingClient;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::storage;
use crate::vector_store::VectorStore;

/// A named, described queryable data source the reasoning step can route
/// sub-questions to.
#[async_trait]
pub trait QueryTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn query(&self, question: &str) -> Result<String, AppError>;
}

/// Tool backed by the persistent job-description collection.
pub struct CollectionTool<'a> {
    store: &'a VectorStore,
    embedder: &'a EmbeddingClient,
    llm: &'a LlmClient,
}

impl<'a> CollectionTool<'a> {
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a EmbeddingClient,
        llm: &'a LlmClient,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
        }
    }
}

#[async_trait]
impl QueryTool for CollectionTool<'_> {
    fn name(&self) -> &str {
        "JDs"
    }

    fn description(&self) -> &str {
        "Contains JD information scraped from the company's career websites."
    }

    async fn query(&self, question: &str) -> Result<String, AppError> {
        let vector = self.embedder.embed(question).await?;
        let hits = self.store.search(&vector, TOP_K).await?;
        if let Some(best) = hits.first() {
            debug!(score = best.score, doc_id = %best.payload.doc_id, "best JD match");
        }
        let context: Vec<String> = hits.into_iter().map(|h| h.payload.text).collect();
        answer_from_context(self.llm, question, &context).await
    }
}

/// Throwaway in-memory index over one résumé. Never persisted; rebuilt
/// (and re-embedded) on every invocation.
pub struct EphemeralIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl EphemeralIndex {
    /// Embeds the chunks and holds them in memory.
    pub async fn build(
        chunks: &[Chunk],
        embedder: &EmbeddingClient,
    ) -> Result<Self, AppError> {
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(crate::embeddings::EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                entries.push((chunk.text.clone(), vector));
            }
        }
        Ok(Self { entries })
    }

    /// Brute-force cosine top-k.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<&str> {
        let mut scored: Vec<(f32, &str)> = self
            .entries
            .iter()
            .map(|(text, vector)| (cosine_similarity(query, vector), text.as_str()))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, text)| text).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tool backed by the ephemeral résumé index.
pub struct ResumeTool<'a> {
    index: EphemeralIndex,
    embedder: &'a EmbeddingClient,
    llm: &'a LlmClient,
}

impl<'a> ResumeTool<'a> {
    pub fn new(index: EphemeralIndex, embedder: &'a EmbeddingClient, llm: &'a LlmClient) -> Self {
        Self {
            index,
            embedder,
            llm,
        }
    }
}

#[async_trait]
impl QueryTool for ResumeTool<'_> {
    fn name(&self) -> &str {
        "CV"
    }

    fn description(&self) -> &str {
        "Contains information about individual candidates"
    }

    async fn query(&self, question: &str) -> Result<String, AppError> {
        let vector = self.embedder.embed(question).await?;
        let context: Vec<String> = self
            .index
            .top_k(&vector, TOP_K)
            .into_iter()
            .map(str::to_string)
            .collect();
        answer_from_context(self.llm, question, &context).await
    }
}

async fn answer_from_context(
    llm: &LlmClient,
    question: &str,
    context: &[String],
) -> Result<String, AppError> {
    let joined = if context.is_empty() {
        "(no passages retrieved)".to_string()
    } else {
        context
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[{}] {}", i + 1, text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    let prompt = prompts::ANSWER_PROMPT_TEMPLATE
        .replace("{context}", &joined)
        .replace("{question}", question);
    Ok(llm.complete(&prompt, prompts::ANSWER_SYSTEM).await?)
}

/// One routed sub-question produced by the decomposition step.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubQuestion {
    pub tool: String,
    pub question: String,
}

/// Decomposes a compound question, routes sub-questions to tools, and
/// synthesizes the final answer.
pub struct SubQuestionEngine<'a> {
    llm: &'a LlmClient,
    tools: Vec<Box<dyn QueryTool + 'a>>,
}

impl<'a> SubQuestionEngine<'a> {
    pub fn new(llm: &'a LlmClient, tools: Vec<Box<dyn QueryTool + 'a>>) -> Self {
        Self { llm, tools }
    }

    pub async fn run(&self, question: &str) -> Result<String, AppError> {
        let subs = self.decompose(question).await?;
        info!(count = subs.len(), "decomposed into sub-questions");

        let mut findings = String::new();
        for sub in &subs {
            let tool = route(&self.tools, &sub.tool)?;
            debug!(tool = tool.name(), question = %sub.question, "routing sub-question");
            let answer = tool.query(&sub.question).await?;
            findings.push_str(&format!(
                "Sub-question ({}): {}\nAnswer: {}\n\n",
                tool.name(),
                sub.question,
                answer
            ));
        }

        let prompt = prompts::SYNTHESIZE_PROMPT_TEMPLATE
            .replace("{question}", question)
            .replace("{findings}", findings.trim_end());
        Ok(self.llm.complete(&prompt, prompts::SYNTHESIZE_SYSTEM).await?)
    }

    async fn decompose(&self, question: &str) -> Result<Vec<SubQuestion>, AppError> {
        let tool_list = self
            .tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::DECOMPOSE_PROMPT_TEMPLATE
            .replace("{tools}", &tool_list)
            .replace("{question}", question);
        Ok(self
            .llm
            .complete_json::<Vec<SubQuestion>>(&prompt, prompts::DECOMPOSE_SYSTEM)
            .await?)
    }
}

fn route<'t, 'a>(
    tools: &'t [Box<dyn QueryTool + 'a>],
    name: &str,
) -> Result<&'t dyn QueryTool, AppError> {
    tools
        .iter()
        .find(|t| t.name() == name)
        .map(|t| t.as_ref())
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "decomposition routed to unknown tool '{name}'"
            ))
        })
}

/// The composed multi-hop question.
pub fn compose_question(id: &str, job_title: &str) -> String {
    format!("What does the user with email {id} need to learn to become a {job_title}?")
}

/// Result file path: `job_recommend/{id}_recommended.txt`.
pub fn result_path(id: &str) -> PathBuf {
    Path::new(UPLOAD_PREFIX).join(format!("{id}_recommended.txt"))
}

/// Runs the full recommendation flow and writes the answer verbatim to the
/// result file, overwriting any previous run for the same id.
pub async fn recommend(
    id: &str,
    job_title: &str,
    embedder: &EmbeddingClient,
    store: &VectorStore,
    llm: &LlmClient,
) -> Result<PathBuf, AppError> {
    let cvs_dir = storage::require_mirror(CVS_PREFIX)?;
    let resume = documents::load_file(&cvs_dir.join(format!("{id}.pdf")))?;
    let chunks = documents::chunk(&resume);
    let index = EphemeralIndex::build(&chunks, embedder).await?;
    info!(id, chunks = index.len(), "embedded résumé into ephemeral index");

    let tools: Vec<Box<dyn QueryTool + '_>> = vec![
        Box::new(CollectionTool::new(store, embedder, llm)),
        Box::new(ResumeTool::new(index, embedder, llm)),
    ];
    let engine = SubQuestionEngine::new(llm, tools);

    let answer = engine.run(&compose_question(id, job_title)).await?;

    let path = result_path(id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(AppError::Io)?;
    }
    std::fs::write(&path, &answer).map_err(AppError::Io)?;
    info!(path = %path.display(), "wrote recommendation");
    Ok(path)
}

/// Cosine similarity with a zero-norm guard.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: Vec<(&str, Vec<f32>)>) -> EphemeralIndex {
        EphemeralIndex {
            entries: entries
                .into_iter()
                .map(|(t, v)| (t.to_string(), v))
                .collect(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_ephemeral_index_ranks_by_similarity() {
        let idx = index(vec![
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.0]),
            ("mid", vec![0.7, 0.7]),
        ]);
        let top = idx.top_k(&[1.0, 0.0], 2);
        assert_eq!(top, vec!["near", "mid"]);
    }

    #[test]
    fn test_ephemeral_index_top_k_caps_at_len() {
        let idx = index(vec![("only", vec![1.0, 0.0])]);
        assert_eq!(idx.top_k(&[1.0, 0.0], 5).len(), 1);
    }

    #[test]
    fn test_sub_question_deserializes() {
        let json = r#"[{"tool": "CV", "question": "What skills?"}]"#;
        let subs: Vec<SubQuestion> = serde_json::from_str(json).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].tool, "CV");
    }

    #[test]
    fn test_compose_question_mentions_id_and_title() {
        let q = compose_question("a@b.com", "Data Engineer");
        assert_eq!(
            q,
            "What does the user with email a@b.com need to learn to become a Data Engineer?"
        );
    }

    #[test]
    fn test_result_path_format() {
        assert_eq!(
            result_path("742"),
            Path::new("job_recommend").join("742_recommended.txt")
        );
    }

    impl std::fmt::Debug for dyn QueryTool + '_ {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("QueryTool").field("name", &self.name()).finish()
        }
    }

    struct StubTool;

    #[async_trait]
    impl QueryTool for StubTool {
        fn name(&self) -> &str {
            "CV"
        }
        fn description(&self) -> &str {
            "stub"
        }
        async fn query(&self, _question: &str) -> Result<String, AppError> {
            Ok("stub answer".to_string())
        }
    }

    #[test]
    fn test_route_finds_tool_by_name() {
        let tools: Vec<Box<dyn QueryTool>> = vec![Box::new(StubTool)];
        assert_eq!(route(&tools, "CV").unwrap().name(), "CV");
    }

    #[test]
    fn test_route_unknown_tool_errors() {
        let tools: Vec<Box<dyn QueryTool>> = vec![Box::new(StubTool)];
        let err = route(&tools, "JDs").unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
