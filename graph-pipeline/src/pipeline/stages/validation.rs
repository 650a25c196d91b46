use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tracing::{debug, info};

use common::error::AppError;
use common::storage::store::GroundTruthFilter;
use common::storage::types::experiment::Layer;
use common::storage::types::ground_truth::EXCLUDED_GROUND_TRUTH_TYPES;
use common::utils::vector::mean_vector;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;
use evaluations::validation::evaluate_validation;
use relation_inference::{relation_stats, RelationInferrer};

/// Infers the relation set and scores it against ground truth per
/// scenario. The inferred relations stay on the context for the graph and
/// consolidation evaluators.
pub struct ValidationStage;

#[async_trait]
impl PipelineStage for ValidationStage {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn description(&self) -> &'static str {
        "Infer relations and score them against ground truth"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Validation)
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_validation && ctx.config.validation.run_on_save
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        services: &PipelineServices,
    ) -> Result<(), AppError> {
        let object_embeddings = object_embeddings(ctx).await?;

        let inference_config = ctx.config.relation_inference.clone();
        let use_contrastive = inference_config.use_contrastive_icl;

        let relations = if use_contrastive {
            let chat = services.chat.clone().ok_or_else(|| {
                AppError::Config("contrastive inference requires a chat backend".into())
            })?;
            let inferrer = RelationInferrer::with_chat_backend(inference_config, chat)?;
            inferrer.infer_all_with_contrastive_icl(&ctx.objects).await?
        } else {
            let inferrer = RelationInferrer::new(inference_config)?;
            inferrer.infer_all_with_embeddings(&ctx.objects, &object_embeddings)
        };

        debug!(relations = relations.len(), "relation inference completed");
        ctx.stats.relations = Some(relation_stats(&relations));

        let mut reports = BTreeMap::new();
        for scenario in &ctx.config.validation.scenarios {
            let ground_truth = ctx
                .store
                .list_ground_truth_relations(&GroundTruthFilter {
                    scenario: Some(scenario.clone()),
                    exclude_types: EXCLUDED_GROUND_TRUTH_TYPES
                        .iter()
                        .map(|t| (*t).to_string())
                        .collect(),
                })
                .await?;
            let report = evaluate_validation(&relations, &ground_truth);
            info!(
                scenario = %scenario,
                f1 = report.f1,
                precision = report.precision,
                recall = report.recall,
                "validation scored"
            );
            reports.insert(scenario.clone(), report);
        }

        ctx.stats.validation = Some(reports);
        ctx.inferred_relations = Some(relations);
        Ok(())
    }
}

/// Per-object embedding: component-wise mean of the object's stored chunk
/// vectors, falling back to this run's in-memory embeddings on a dry run.
async fn object_embeddings(
    ctx: &PipelineContext,
) -> Result<HashMap<String, Vec<f32>>, AppError> {
    let mut result = HashMap::new();

    for object in &ctx.objects {
        let stored = ctx.store.list_chunks_by_object_id(&object.id).await?;
        let mut vectors: Vec<Vec<f32>> = stored
            .into_iter()
            .filter_map(|chunk| chunk.embedding)
            .collect();

        if vectors.is_empty() {
            vectors = ctx
                .chunks
                .iter()
                .filter(|chunk| chunk.canonical_object_id == object.id)
                .filter_map(|chunk| ctx.embeddings.get(&chunk.id).cloned())
                .collect();
        }

        if let Some(mean) = mean_vector(&vectors) {
            result.insert(object.id.clone(), mean);
        }
    }

    Ok(result)
}
