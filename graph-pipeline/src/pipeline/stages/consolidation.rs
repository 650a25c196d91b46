use async_trait::async_trait;
use tracing::info;

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;
use evaluations::consolidation::evaluate_consolidation;

/// Near-duplicate and redundant-relation opportunities in the batch.
pub struct ConsolidationStage;

#[async_trait]
impl PipelineStage for ConsolidationStage {
    fn name(&self) -> &'static str {
        "consolidation"
    }

    fn description(&self) -> &'static str {
        "Detect near-duplicate objects and redundant relations"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Consolidation)
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_validation
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        _services: &PipelineServices,
    ) -> Result<(), AppError> {
        let relations = ctx.inferred_relations.clone().unwrap_or_default();
        let report = evaluate_consolidation(&ctx.objects, &relations);
        info!(
            duplicate_pairs = report.duplicate_pairs,
            clusters = report.duplicate_clusters,
            redundant_relations = report.redundant_relations,
            ratio = report.consolidation_ratio,
            "consolidation evaluation completed"
        );

        ctx.stats.consolidation = Some(report);
        Ok(())
    }
}
