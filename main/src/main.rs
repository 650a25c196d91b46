use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use common::storage::memory::MemoryStore;
use common::storage::types::canonical_object::CanonicalObject;
use common::storage::types::ground_truth::{GroundTruthQuery, GroundTruthRelation};
use common::utils::config::{get_config, ExperimentConfig};
use common::utils::embedding::{EmbeddingBackend, HashedEmbeddings, OpenAiEmbeddings};
use common::utils::llm::OpenAiChat;
use graph_pipeline::pipeline::{PipelineRunner, PipelineServices, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum Backend {
    /// Deterministic offline embeddings; no credentials needed.
    Hashed,
    /// OpenAI-compatible embedding and chat APIs.
    OpenAi,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashed => write!(f, "hashed"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Run one knowledge-graph construction + evaluation experiment.
#[derive(Debug, Parser)]
#[command(name = "pipeline")]
struct Args {
    /// Experiment config (YAML)
    #[arg(long)]
    config: PathBuf,

    /// Canonical objects corpus (JSON array)
    #[arg(long)]
    objects: PathBuf,

    /// Ground-truth relations (JSON array)
    #[arg(long)]
    ground_truth_relations: Option<PathBuf>,

    /// Ground-truth queries (JSON array)
    #[arg(long)]
    ground_truth_queries: Option<PathBuf>,

    /// Embedding / LLM backend
    #[arg(long, value_enum, default_value_t = Backend::Hashed)]
    backend: Backend,

    /// Vector dimension for the hashed backend
    #[arg(long, default_value_t = 256)]
    hashed_dimension: usize,

    /// Skip the storage stage (dry run)
    #[arg(long)]
    dry_run: bool,

    /// Skip retrieval, validation and graph/temporal/consolidation stages
    #[arg(long)]
    skip_validation: bool,

    /// Recorded as triggered_by on activity rows
    #[arg(long, default_value = "cli")]
    triggered_by: String,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {what} from {}", path.display()))
}

async fn seed_store(store: &MemoryStore, args: &Args) -> Result<usize> {
    let objects: Vec<CanonicalObject> = load_json(&args.objects, "canonical objects")?;
    let object_count = objects.len();
    for object in objects {
        store.insert_canonical_object(object).await;
    }

    if let Some(path) = &args.ground_truth_relations {
        let relations: Vec<GroundTruthRelation> = load_json(path, "ground-truth relations")?;
        for relation in relations {
            store.insert_ground_truth_relation(relation).await;
        }
    }
    if let Some(path) = &args.ground_truth_queries {
        let queries: Vec<GroundTruthQuery> = load_json(path, "ground-truth queries")?;
        for query in queries {
            store.insert_ground_truth_query(query).await;
        }
    }

    Ok(object_count)
}

fn build_services(args: &Args, config: &ExperimentConfig) -> Result<PipelineServices> {
    match args.backend {
        Backend::Hashed => {
            if config.relation_inference.use_contrastive_icl {
                bail!("contrastive inference needs the openai backend");
            }
            let embedder: Arc<dyn EmbeddingBackend> =
                Arc::new(HashedEmbeddings::new(args.hashed_dimension));
            Ok(PipelineServices::new(embedder))
        }
        Backend::OpenAi => {
            let app_config = get_config().context("loading environment configuration")?;
            let api_key = app_config
                .openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required for the openai backend")?;

            let embedder: Arc<dyn EmbeddingBackend> = Arc::new(OpenAiEmbeddings::from_api(
                api_key,
                &app_config.openai_base_url,
            ));
            let mut services = PipelineServices::new(embedder);
            if config.relation_inference.use_contrastive_icl {
                services = services.with_chat(Arc::new(OpenAiChat::from_api(
                    api_key,
                    &app_config.openai_base_url,
                )));
            }
            Ok(services)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = ExperimentConfig::from_yaml_file(&args.config)
        .with_context(|| format!("loading experiment config {}", args.config.display()))?;

    let store = Arc::new(MemoryStore::new());
    let object_count = seed_store(&store, &args).await?;
    info!(
        experiment = %config.name,
        objects = object_count,
        backend = ?args.backend,
        "corpus loaded"
    );

    let services = build_services(&args, &config)?;
    let runner = PipelineRunner::new(config, store, services)?.with_options(RunOptions {
        skip_storage: args.dry_run,
        skip_validation: args.skip_validation,
        triggered_by: Some(args.triggered_by.clone()),
        ..RunOptions::default()
    });

    let result = runner.run(None).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serialising pipeline result")?
    );

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_corpus() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"[{{"id": "slack|w|thread|T1", "platform": "slack", "object_type": "thread",
                 "timestamps": {{"created_at": "2025-01-01T00:00:00Z"}}}}]"#
        )
        .expect("write");

        let objects: Vec<CanonicalObject> =
            load_json(file.path(), "canonical objects").expect("load");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, "slack|w|thread|T1");
    }

    #[test]
    fn test_load_json_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");
        assert!(load_json::<CanonicalObject>(file.path(), "canonical objects").is_err());
    }
}
