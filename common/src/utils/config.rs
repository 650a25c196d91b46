use std::fmt;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Process-level configuration pulled from the environment (and an
/// optional `config` file next to the binary).
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

/// Chunking strategies the chunker accepts. `full_text` chunks exist on
/// the wire but are not a strategy you can configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStrategy {
    #[serde(rename = "fixed-size")]
    FixedSize,
    #[serde(rename = "semantic")]
    Semantic,
    #[serde(rename = "relational")]
    Relational,
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FixedSize => "fixed-size",
            Self::Semantic => "semantic",
            Self::Relational => "relational",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dimensions: Option<u32>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: None,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_strategy")]
    pub strategy: ChunkStrategy,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_true")]
    pub preserve_metadata: bool,
}

fn default_chunk_strategy() -> ChunkStrategy {
    ChunkStrategy::FixedSize
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    100
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_chunk_strategy(),
            max_chunk_size: default_max_chunk_size(),
            overlap: default_overlap(),
            preserve_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,
    #[serde(default)]
    pub include_relations: bool,
    #[serde(default = "default_relation_depth")]
    pub relation_depth: usize,
}

fn default_retrieval_threshold() -> f32 {
    0.7
}

fn default_chunk_limit() -> usize {
    10
}

fn default_relation_depth() -> usize {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_retrieval_threshold(),
            chunk_limit: default_chunk_limit(),
            include_relations: false,
            relation_depth: default_relation_depth(),
        }
    }
}

/// One few-shot exemplar pair for contrastive classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExamplePair {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContrastiveExamples {
    #[serde(default)]
    pub positive: Vec<ExamplePair>,
    #[serde(default)]
    pub negative: Vec<ExamplePair>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LlmOptions {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    64
}

/// The full, fully-enumerated relation-inference option record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationInferenceConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_keyword_overlap_threshold")]
    pub keyword_overlap_threshold: f64,
    #[serde(default = "default_true")]
    pub include_inferred: bool,
    #[serde(default)]
    pub use_semantic_similarity: bool,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_true")]
    pub enable_duplicate_detection: bool,
    #[serde(default)]
    pub use_contrastive_icl: bool,
    #[serde(default)]
    pub contrastive_examples: ContrastiveExamples,
    #[serde(default, rename = "llmConfig")]
    pub llm_config: Option<LlmOptions>,
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_keyword_overlap_threshold() -> f64 {
    0.65
}

fn default_semantic_weight() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

impl Default for RelationInferenceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            keyword_overlap_threshold: default_keyword_overlap_threshold(),
            include_inferred: true,
            use_semantic_similarity: false,
            semantic_weight: default_semantic_weight(),
            enable_duplicate_detection: true,
            use_contrastive_icl: false,
            contrastive_examples: ContrastiveExamples::default(),
            llm_config: None,
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub run_on_save: bool,
    #[serde(default)]
    pub auto_save_experiment: bool,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<String>,
}

fn default_scenarios() -> Vec<String> {
    vec!["normal".to_string()]
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            run_on_save: true,
            auto_save_experiment: false,
            scenarios: default_scenarios(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    #[serde(default)]
    pub baseline: bool,
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub paper_ids: Vec<String>,
}

/// Declarative per-experiment configuration. Loaded from YAML; unknown
/// options anywhere in the tree are rejected at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExperimentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub relation_inference: RelationInferenceConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl ExperimentConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AppError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|err| AppError::Config(format!("invalid experiment config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Named config with all defaults, handy for tests and ad-hoc runs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            relation_inference: RelationInferenceConfig::default(),
            validation: ValidationConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }

    /// Scenario the retrieval stage evaluates.
    pub fn first_scenario(&self) -> &str {
        self.validation
            .scenarios
            .first()
            .map_or("normal", String::as_str)
    }

    /// Fatal construction-time validation; anything caught here is a
    /// `Config` error, never a per-object failure later.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Config("experiment name must not be empty".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::Config("embedding.batchSize must be positive".into()));
        }
        if self.chunking.max_chunk_size == 0 {
            return Err(AppError::Config("chunking.maxChunkSize must be positive".into()));
        }
        if self.chunking.overlap >= self.chunking.max_chunk_size {
            return Err(AppError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.maxChunkSize ({})",
                self.chunking.overlap, self.chunking.max_chunk_size
            )));
        }
        validate_unit_range(
            "retrieval.similarityThreshold",
            f64::from(self.retrieval.similarity_threshold),
        )?;

        let inference = &self.relation_inference;
        validate_unit_range(
            "relationInference.similarityThreshold",
            inference.similarity_threshold,
        )?;
        validate_unit_range(
            "relationInference.keywordOverlapThreshold",
            inference.keyword_overlap_threshold,
        )?;
        validate_unit_range("relationInference.semanticWeight", inference.semantic_weight)?;
        if inference.use_contrastive_icl && inference.llm_config.is_none() {
            return Err(AppError::Config(
                "relationInference.useContrastiveICL requires relationInference.llmConfig".into(),
            ));
        }
        Ok(())
    }
}

fn validate_unit_range(field: &str, value: f64) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AppError::Config(format!(
            "{field} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
