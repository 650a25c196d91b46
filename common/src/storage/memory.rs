use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::store::{GroundTruthFilter, NearestChunk, ObjectFilter, Store};
use crate::storage::types::{
    activity::ActivityRecord,
    canonical_object::CanonicalObject,
    chunk::Chunk,
    experiment::{
        ExperimentRecord, ExperimentResult, ExperimentStatus, LayerMetricsRecord, NewExperiment,
    },
    ground_truth::{GroundTruthQuery, GroundTruthRelation},
};
use crate::utils::vector::cosine_similarity;

#[derive(Default)]
struct MemoryInner {
    objects: Vec<CanonicalObject>,
    chunks: Vec<Chunk>,
    experiments: Vec<ExperimentRecord>,
    experiment_results: HashMap<(String, String), ExperimentResult>,
    layer_metrics: HashMap<(String, String, String), LayerMetricsRecord>,
    activity_log: Vec<ActivityRecord>,
    ground_truth_relations: Vec<GroundTruthRelation>,
    ground_truth_queries: Vec<GroundTruthQuery>,
}

/// In-memory implementation of the persistence surface. Backs tests and
/// offline runs; a production engine implements the same trait. Each call
/// holds the single lock for its duration, which gives the per-call
/// transactionality the pipeline expects.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a canonical object. Duplicate ids replace the earlier copy so
    /// corpus files can be reloaded.
    pub async fn insert_canonical_object(&self, object: CanonicalObject) {
        let mut inner = self.inner.write().await;
        inner.objects.retain(|existing| existing.id != object.id);
        inner.objects.push(object);
    }

    pub async fn insert_ground_truth_relation(&self, relation: GroundTruthRelation) {
        self.inner.write().await.ground_truth_relations.push(relation);
    }

    pub async fn insert_ground_truth_query(&self, query: GroundTruthQuery) {
        self.inner.write().await.ground_truth_queries.push(query);
    }

    /// Test/inspection helpers below; none of these are part of the store
    /// surface the pipeline consumes.
    pub async fn experiment_by_name(&self, name: &str) -> Option<ExperimentRecord> {
        self.inner
            .read()
            .await
            .experiments
            .iter()
            .find(|experiment| experiment.name == name)
            .cloned()
    }

    pub async fn experiment_results(&self, experiment_id: &str) -> Vec<ExperimentResult> {
        self.inner
            .read()
            .await
            .experiment_results
            .values()
            .filter(|result| result.experiment_id == experiment_id)
            .cloned()
            .collect()
    }

    pub async fn layer_metrics(&self, experiment_id: &str) -> Vec<LayerMetricsRecord> {
        self.inner
            .read()
            .await
            .layer_metrics
            .values()
            .filter(|record| record.experiment_id == experiment_id)
            .cloned()
            .collect()
    }

    pub async fn activity_log(&self) -> Vec<ActivityRecord> {
        self.inner.read().await.activity_log.clone()
    }

    pub async fn all_chunks(&self) -> Vec<Chunk> {
        self.inner.read().await.chunks.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn search_canonical_objects(
        &self,
        filter: &ObjectFilter,
        limit: Option<usize>,
    ) -> Result<Vec<CanonicalObject>, AppError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<CanonicalObject> = inner
            .objects
            .iter()
            .filter(|object| filter.matches(object))
            .cloned()
            .collect();
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn upsert_experiment(&self, experiment: NewExperiment) -> Result<String, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .experiments
            .iter_mut()
            .find(|record| record.name == experiment.name)
        {
            existing.description = experiment.description;
            existing.config_json = experiment.config_json;
            existing.is_baseline = experiment.is_baseline;
            existing.paper_ids = experiment.paper_ids;
            existing.git_commit = experiment.git_commit;
            existing.status = experiment.status;
            existing.run_completed_at = None;
            return Ok(existing.id.clone());
        }

        let record = ExperimentRecord {
            id: Uuid::new_v4().to_string(),
            name: experiment.name,
            description: experiment.description,
            config_json: experiment.config_json,
            is_baseline: experiment.is_baseline,
            paper_ids: experiment.paper_ids,
            git_commit: experiment.git_commit,
            status: experiment.status,
            created_at: Utc::now(),
            run_completed_at: None,
        };
        let id = record.id.clone();
        inner.experiments.push(record);
        Ok(id)
    }

    async fn update_experiment_status(
        &self,
        id: &str,
        status: ExperimentStatus,
        run_completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .experiments
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| AppError::NotFound(format!("experiment {id} not found")))?;
        record.status = status;
        if run_completed_at.is_some() {
            record.run_completed_at = run_completed_at;
        }
        Ok(())
    }

    async fn upsert_experiment_result(&self, result: ExperimentResult) -> Result<(), AppError> {
        let key = (result.experiment_id.clone(), result.scenario.clone());
        self.inner.write().await.experiment_results.insert(key, result);
        Ok(())
    }

    async fn upsert_layer_metrics(&self, metrics: LayerMetricsRecord) -> Result<(), AppError> {
        let key = (
            metrics.experiment_id.clone(),
            metrics.layer.to_string(),
            metrics.evaluation_method.clone(),
        );
        self.inner.write().await.layer_metrics.insert(key, metrics);
        Ok(())
    }

    async fn insert_activity_log(&self, record: ActivityRecord) -> Result<(), AppError> {
        self.inner.write().await.activity_log.push(record);
        Ok(())
    }

    async fn delete_chunks_by_object_ids(&self, ids: &[String]) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner
            .chunks
            .retain(|chunk| !ids.iter().any(|id| id == &chunk.canonical_object_id));
        Ok(())
    }

    async fn insert_chunk(&self, chunk: Chunk) -> Result<(), AppError> {
        self.inner.write().await.chunks.push(chunk);
        Ok(())
    }

    async fn list_chunks_by_object_id(&self, id: &str) -> Result<Vec<Chunk>, AppError> {
        let inner = self.inner.read().await;
        let mut chunks: Vec<Chunk> = inner
            .chunks
            .iter()
            .filter(|chunk| chunk.canonical_object_id == id)
            .cloned()
            .collect();
        chunks.sort_by_key(|chunk| chunk.chunk_index);
        Ok(chunks)
    }

    async fn nearest_chunks(
        &self,
        query_embedding: &[f32],
        similarity_min: f32,
        limit: usize,
    ) -> Result<Vec<NearestChunk>, AppError> {
        let inner = self.inner.read().await;

        #[allow(clippy::cast_possible_truncation)]
        let mut hits: Vec<NearestChunk> = inner
            .chunks
            .iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_deref()?;
                let similarity = cosine_similarity(query_embedding, embedding) as f32;
                (similarity >= similarity_min).then(|| NearestChunk {
                    chunk_id: chunk.id.clone(),
                    canonical_object_id: chunk.canonical_object_id.clone(),
                    content: chunk.content.clone(),
                    similarity,
                })
            })
            .collect();

        // Stable sort keeps insertion order among equal similarities.
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_ground_truth_relations(
        &self,
        filter: &GroundTruthFilter,
    ) -> Result<Vec<GroundTruthRelation>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ground_truth_relations
            .iter()
            .filter(|relation| {
                if let Some(scenario) = &filter.scenario {
                    if &relation.scenario != scenario {
                        return false;
                    }
                }
                !filter
                    .exclude_types
                    .iter()
                    .any(|excluded| excluded == &relation.relation_type)
            })
            .cloned()
            .collect())
    }

    async fn list_ground_truth_queries(
        &self,
        scenario: &str,
    ) -> Result<Vec<GroundTruthQuery>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ground_truth_queries
            .iter()
            .filter(|query| query.scenario == scenario)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::chunk::ChunkMethod;
    use crate::storage::types::experiment::Layer;
    use serde_json::json;

    fn chunk_with_embedding(object_id: &str, index: usize, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(object_id, index, format!("chunk {index}"), ChunkMethod::FixedSize);
        chunk.embedding = Some(embedding);
        chunk
    }

    #[tokio::test]
    async fn test_search_canonical_objects_filters_and_limits() {
        let store = MemoryStore::new();
        store
            .insert_canonical_object(CanonicalObject::new("slack|w|thread|T1", "slack", "thread"))
            .await;
        store
            .insert_canonical_object(CanonicalObject::new("linear|w|issue|I1", "linear", "issue"))
            .await;
        store
            .insert_canonical_object(CanonicalObject::new("slack|w|thread|T2", "slack", "thread"))
            .await;

        let filter = ObjectFilter {
            platform: Some("slack".to_string()),
            ..ObjectFilter::default()
        };
        let slack_objects = store
            .search_canonical_objects(&filter, None)
            .await
            .expect("search");
        assert_eq!(slack_objects.len(), 2);

        let limited = store
            .search_canonical_objects(&ObjectFilter::default(), Some(1))
            .await
            .expect("search");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_experiment_is_unique_on_name() {
        let store = MemoryStore::new();
        let first = store
            .upsert_experiment(NewExperiment {
                name: "baseline".to_string(),
                description: "first".to_string(),
                config_json: json!({}),
                is_baseline: true,
                paper_ids: Vec::new(),
                git_commit: None,
                status: ExperimentStatus::Running,
            })
            .await
            .expect("upsert");
        let second = store
            .upsert_experiment(NewExperiment {
                name: "baseline".to_string(),
                description: "second".to_string(),
                config_json: json!({"k": 1}),
                is_baseline: false,
                paper_ids: Vec::new(),
                git_commit: None,
                status: ExperimentStatus::Running,
            })
            .await
            .expect("upsert");

        assert_eq!(first, second);
        let record = store.experiment_by_name("baseline").await.expect("record");
        assert_eq!(record.description, "second");
    }

    #[tokio::test]
    async fn test_update_experiment_status_unknown_id_errors() {
        let store = MemoryStore::new();
        let result = store
            .update_experiment_status("missing", ExperimentStatus::Failed, None)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_chunk_replacement_by_object_ids() {
        let store = MemoryStore::new();
        store
            .insert_chunk(chunk_with_embedding("obj-a", 0, vec![1.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(chunk_with_embedding("obj-a", 1, vec![0.0, 1.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(chunk_with_embedding("obj-b", 0, vec![1.0, 1.0]))
            .await
            .expect("insert");

        store
            .delete_chunks_by_object_ids(&["obj-a".to_string()])
            .await
            .expect("delete");

        assert!(store
            .list_chunks_by_object_id("obj-a")
            .await
            .expect("list")
            .is_empty());
        assert_eq!(
            store
                .list_chunks_by_object_id("obj-b")
                .await
                .expect("list")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_nearest_chunks_orders_and_thresholds() {
        let store = MemoryStore::new();
        store
            .insert_chunk(chunk_with_embedding("obj-a", 0, vec![1.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(chunk_with_embedding("obj-b", 0, vec![0.9, 0.1]))
            .await
            .expect("insert");
        store
            .insert_chunk(chunk_with_embedding("obj-c", 0, vec![0.0, 1.0]))
            .await
            .expect("insert");

        let hits = store
            .nearest_chunks(&[1.0, 0.0], 0.5, 10)
            .await
            .expect("nearest");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].canonical_object_id, "obj-a");
        assert_eq!(hits[1].canonical_object_id, "obj-b");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn test_nearest_chunks_dimension_mismatch_scores_zero() {
        let store = MemoryStore::new();
        store
            .insert_chunk(chunk_with_embedding("obj-a", 0, vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert");

        let hits = store
            .nearest_chunks(&[1.0, 0.0], 0.1, 10)
            .await
            .expect("nearest");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_ground_truth_filters() {
        let store = MemoryStore::new();
        for (relation_type, scenario) in [
            ("related_to", "normal"),
            ("human_verified_unrelated", "normal"),
            ("related_to", "stress"),
        ] {
            store
                .insert_ground_truth_relation(GroundTruthRelation {
                    from_id: "a".to_string(),
                    to_id: "b".to_string(),
                    relation_type: relation_type.to_string(),
                    source: "human".to_string(),
                    confidence: 1.0,
                    scenario: scenario.to_string(),
                })
                .await;
        }

        let filter = GroundTruthFilter {
            scenario: Some("normal".to_string()),
            exclude_types: vec!["human_verified_unrelated".to_string()],
        };
        let relations = store
            .list_ground_truth_relations(&filter)
            .await
            .expect("list");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, "related_to");
    }

    #[tokio::test]
    async fn test_layer_metrics_upsert_is_unique_on_key() {
        let store = MemoryStore::new();
        for duration in [5u64, 9u64] {
            store
                .upsert_layer_metrics(LayerMetricsRecord {
                    experiment_id: "e1".to_string(),
                    layer: Layer::Chunking,
                    evaluation_method: "pipeline".to_string(),
                    metrics_json: json!({"total_chunks": 3}),
                    duration_ms: duration,
                })
                .await
                .expect("upsert");
        }

        let records = store.layer_metrics("e1").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_ms, 9);
    }
}
