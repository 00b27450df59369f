mod config;
mod crawler;
mod documents;
mod embeddings;
mod errors;
mod indexer;
mod llm_client;
mod recommend;
mod storage;
mod vector_store;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{
    Config, COLLECTION_NAME, CVS_PREFIX, FILTERED_CSV_STEM, JDS_PREFIX, SCRAPED_PREFIX,
};
use crate::embeddings::EmbeddingClient;
use crate::errors::AppError;
use crate::indexer::Indexer;
use crate::llm_client::LlmClient;
use crate::storage::{build_s3_client, mirror_dir, require_mirror, ObjectMirror};
use crate::vector_store::VectorStore;

/// Job-description indexing and skill recommendation pipeline.
///
/// Steps are boolean switches; when several are given they run in a fixed
/// order: download, cv, jobs, process, recommend, upload.
#[derive(Debug, Parser)]
#[command(name = "jobrec", version, about = "JD indexing and skill recommendation")]
struct Cli {
    /// Download job description PDFs from the bucket
    #[arg(short = 'd', long)]
    download: bool,

    /// Download one candidate's résumé from the bucket (requires --id)
    #[arg(short = 'c', long, requires = "id")]
    cv: bool,

    /// Download the filtered jobs CSV from the bucket
    #[arg(long)]
    jobs: bool,

    /// Parse the downloaded JDs and upsert embeddings into the vector collection
    #[arg(short = 'p', long)]
    process: bool,

    /// Index a single PDF instead of the whole JD mirror (with --process)
    #[arg(long, value_name = "PDF", requires = "process")]
    file: Option<std::path::PathBuf>,

    /// Recommend skills to learn given a user id and target job title
    #[arg(short = 'r', long, requires_all = ["id", "job_title"])]
    recommend: bool,

    /// Upload the user's recommendation result to the bucket (requires --id)
    #[arg(short = 'u', long, requires = "id")]
    upload: bool,

    /// Print the crawler settings consumed by the scraper tier and exit
    #[arg(long)]
    crawl_config: bool,

    /// ID of the user
    #[arg(short = 'i', long)]
    id: Option<String>,

    /// The job title the user is targeting
    #[arg(short = 'j', long)]
    job_title: Option<String>,
}

impl Cli {
    /// Flag-combination rules beyond what clap's `requires` expresses.
    /// Runs before configuration loading, so no network call is attempted
    /// on a bad combination.
    fn validate(&self) -> Result<(), String> {
        if self.job_title.is_some() && !self.recommend {
            return Err("-j/--job-title is only meaningful with -r/--recommend".to_string());
        }
        if self.id.is_some() && !(self.cv || self.recommend || self.upload) {
            return Err(
                "-i/--id is only meaningful with -c/--cv, -r/--recommend or -u/--upload"
                    .to_string(),
            );
        }
        let any_step = self.download
            || self.cv
            || self.jobs
            || self.process
            || self.recommend
            || self.upload
            || self.crawl_config;
        if !any_step {
            return Err("no step selected; pass at least one of -d, -c, --jobs, -p, -r, -u".to_string());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(message) = cli.validate() {
        // Usage errors exit through clap's own path, before any work.
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.error(clap::error::ErrorKind::ArgumentConflict, message).exit();
    }

    if cli.crawl_config {
        // Only the proxy key is needed here, so the full Config is not loaded.
        config::load_secrets();
        let settings = crawler::CrawlSettings::default()
            .with_proxy_api_key(std::env::var(crawler::PROXY_API_KEY_VAR).ok());
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobrec v{}", env!("CARGO_PKG_VERSION"));

    run(cli, config).await?;
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    // Static credentials; constructing the client performs no I/O, so it is
    // built unconditionally even for runs that never touch the bucket.
    let mirror = ObjectMirror::new(build_s3_client(&config).await, config.s3_bucket.clone());

    if cli.download {
        mirror.sync(JDS_PREFIX, ".pdf", &mirror_dir(JDS_PREFIX)).await?;
    }

    if let (true, Some(id)) = (cli.cv, cli.id.as_deref()) {
        mirror
            .sync(CVS_PREFIX, &format!("{id}.pdf"), &mirror_dir(CVS_PREFIX))
            .await?;
    }

    if cli.jobs {
        mirror
            .sync(
                SCRAPED_PREFIX,
                &format!("{FILTERED_CSV_STEM}.csv"),
                &mirror_dir(SCRAPED_PREFIX),
            )
            .await?;
    }

    if cli.process {
        let embedder = EmbeddingClient::new(config.openai_api_key.clone());
        let store = VectorStore::new(
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            COLLECTION_NAME,
        )?;
        let indexer = Indexer::new(&embedder, &store);
        match &cli.file {
            Some(path) => indexer.index_file(path).await?,
            None => indexer.index_dir(&require_mirror(JDS_PREFIX)?).await?,
        };
    }

    if let (true, Some(id), Some(job_title)) =
        (cli.recommend, cli.id.as_deref(), cli.job_title.as_deref())
    {
        let embedder = EmbeddingClient::new(config.openai_api_key.clone());
        let store = VectorStore::new(
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            COLLECTION_NAME,
        )?;
        let llm = LlmClient::new(config.anthropic_api_key.clone());
        info!("LLM client initialized (model: {})", llm_client::MODEL);

        recommend::recommend(id, job_title, &embedder, &store, &llm).await?;
    }

    if let (true, Some(id)) = (cli.upload, cli.id.as_deref()) {
        mirror.upload_result(&recommend::result_path(id)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("jobrec").chain(args.iter().copied()))
    }

    #[test]
    fn test_recommend_requires_id_and_job_title() {
        assert!(parse(&["-r"]).is_err());
        assert!(parse(&["-r", "-i", "742"]).is_err());
        assert!(parse(&["-r", "-j", "Data Engineer"]).is_err());
        assert!(parse(&["-r", "-i", "742", "-j", "Data Engineer"]).is_ok());
    }

    #[test]
    fn test_job_title_without_recommend_is_rejected() {
        let cli = parse(&["-d", "-j", "Data Engineer"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_id_without_consuming_step_is_rejected() {
        let cli = parse(&["-d", "-i", "742"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cv_requires_id() {
        assert!(parse(&["-c"]).is_err());
        let cli = parse(&["-c", "-i", "742"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_upload_requires_id() {
        assert!(parse(&["-u"]).is_err());
        let cli = parse(&["-u", "-i", "742"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_no_step_is_rejected() {
        let cli = parse(&[]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_file_requires_process() {
        assert!(parse(&["--file", "x.pdf"]).is_err());
        assert!(parse(&["-p", "--file", "x.pdf"]).is_ok());
    }

    #[test]
    fn test_download_and_process_combine() {
        let cli = parse(&["-d", "-p"]).unwrap();
        assert!(cli.validate().is_ok());
        assert!(cli.download && cli.process);
    }
}
