use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::storage::types::{
    activity::ActivityRecord,
    canonical_object::CanonicalObject,
    chunk::Chunk,
    experiment::{ExperimentResult, ExperimentStatus, LayerMetricsRecord, NewExperiment},
    ground_truth::{GroundTruthQuery, GroundTruthRelation},
};

/// Filter for canonical-object searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectFilter {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

impl ObjectFilter {
    pub fn matches(&self, object: &CanonicalObject) -> bool {
        if let Some(platform) = &self.platform {
            if &object.platform != platform {
                return false;
            }
        }
        if let Some(object_type) = &self.object_type {
            if &object.object_type != object_type {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| id == &object.id) {
                return false;
            }
        }
        true
    }
}

/// Filter for ground-truth relation listings.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthFilter {
    pub scenario: Option<String>,
    pub exclude_types: Vec<String>,
}

/// One hit from the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearestChunk {
    pub chunk_id: String,
    pub canonical_object_id: String,
    pub content: String,
    pub similarity: f32,
}

/// Fixed query surface the pipeline depends on. Every call is assumed
/// transactional; implementations decide how (the in-memory store takes a
/// single lock, a database engine would use real transactions).
#[async_trait]
pub trait Store: Send + Sync {
    async fn search_canonical_objects(
        &self,
        filter: &ObjectFilter,
        limit: Option<usize>,
    ) -> Result<Vec<CanonicalObject>, AppError>;

    /// Upsert keyed on experiment `name`; returns the row id.
    async fn upsert_experiment(&self, experiment: NewExperiment) -> Result<String, AppError>;

    async fn update_experiment_status(
        &self,
        id: &str,
        status: ExperimentStatus,
        run_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Upsert keyed on `(experiment_id, scenario)`.
    async fn upsert_experiment_result(&self, result: ExperimentResult) -> Result<(), AppError>;

    /// Upsert keyed on `(experiment_id, layer, evaluation_method)`.
    async fn upsert_layer_metrics(&self, metrics: LayerMetricsRecord) -> Result<(), AppError>;

    async fn insert_activity_log(&self, record: ActivityRecord) -> Result<(), AppError>;

    async fn delete_chunks_by_object_ids(&self, ids: &[String]) -> Result<(), AppError>;

    async fn insert_chunk(&self, chunk: Chunk) -> Result<(), AppError>;

    async fn list_chunks_by_object_id(&self, id: &str) -> Result<Vec<Chunk>, AppError>;

    /// Top-`limit` chunks by cosine similarity at or above `similarity_min`,
    /// ordered by similarity descending with insertion order as tiebreak.
    async fn nearest_chunks(
        &self,
        query_embedding: &[f32],
        similarity_min: f32,
        limit: usize,
    ) -> Result<Vec<NearestChunk>, AppError>;

    async fn list_ground_truth_relations(
        &self,
        filter: &GroundTruthFilter,
    ) -> Result<Vec<GroundTruthRelation>, AppError>;

    async fn list_ground_truth_queries(
        &self,
        scenario: &str,
    ) -> Result<Vec<GroundTruthQuery>, AppError>;
}
