use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::storage::store::Store;
use common::storage::types::canonical_object::CanonicalObject;
use common::storage::types::chunk::Chunk;
use common::storage::types::experiment::Layer;
use common::storage::types::relation::Relation;
use common::utils::config::ExperimentConfig;

use crate::chunker::ChunkingStats;
use crate::embedder::EmbeddingStats;
use evaluations::consolidation::ConsolidationReport;
use evaluations::graph::GraphReport;
use evaluations::retrieval::RetrievalReport;
use evaluations::temporal::TemporalReport;
use evaluations::validation::ValidationReport;
use relation_inference::RelationStats;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageStats {
    pub objects_replaced: usize,
    pub chunks_stored: usize,
}

/// Stats block stages append to as the run progresses. Each stage owns its
/// own field; earlier fields are read-only to later stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalReport>,
    /// Per-scenario validation reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<BTreeMap<String, ValidationReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relations: Option<RelationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<ConsolidationReport>,
}

impl PipelineStats {
    /// Serialized stats section for one layer, for layer-metric rows.
    pub fn layer_json(&self, layer: Layer) -> Option<Value> {
        fn to_json<T: serde::Serialize>(value: &T) -> Value {
            serde_json::to_value(value).unwrap_or(Value::Null)
        }
        match layer {
            Layer::Chunking => self.chunking.as_ref().map(to_json),
            Layer::Embedding => self.embedding.as_ref().map(to_json),
            Layer::Retrieval => self.retrieval.as_ref().map(to_json),
            Layer::Validation => self.validation.as_ref().map(to_json),
            Layer::Graph => self.graph.as_ref().map(to_json),
            Layer::Temporal => self.temporal.as_ref().map(to_json),
            Layer::Consolidation => self.consolidation.as_ref().map(to_json),
        }
    }
}

/// Run-time flags that are not part of the experiment definition.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Dry run: storage stage is skipped entirely.
    pub skip_storage: bool,
    /// Skip retrieval, validation and the graph/temporal/consolidation
    /// evaluators.
    pub skip_validation: bool,
    /// Recorded as `triggered_by` on activity rows.
    pub triggered_by: Option<String>,
    /// Checked between stages; when set the run stops with a `cancelled`
    /// failure record.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Applied to every stage; a stage that overruns fails the run.
    pub stage_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn triggered_by(&self) -> &str {
        self.triggered_by.as_deref().unwrap_or("pipeline")
    }
}

/// Shared mutable record threaded through the stages. The runner owns it
/// exclusively for the duration of a run and discards it afterwards.
pub struct PipelineContext {
    pub config: ExperimentConfig,
    pub options: RunOptions,
    pub started_at: DateTime<Utc>,
    pub objects: Vec<CanonicalObject>,
    pub chunks: Vec<Chunk>,
    /// Chunk id → vector, populated by the embedding stage.
    pub embeddings: HashMap<String, Vec<f32>>,
    /// Populated by the validation stage for downstream evaluators.
    pub inferred_relations: Option<Vec<Relation>>,
    pub stats: PipelineStats,
    pub store: Arc<dyn Store>,
    pub experiment_id: Option<String>,
}

impl PipelineContext {
    pub fn new(
        config: ExperimentConfig,
        options: RunOptions,
        objects: Vec<CanonicalObject>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            config,
            options,
            started_at: Utc::now(),
            objects,
            chunks: Vec::new(),
            embeddings: HashMap::new(),
            inferred_relations: None,
            stats: PipelineStats::default(),
            store,
            experiment_id: None,
        }
    }

    /// Object ids in the current batch, in corpus order.
    pub fn object_ids(&self) -> Vec<String> {
        self.objects.iter().map(|object| object.id.clone()).collect()
    }
}
