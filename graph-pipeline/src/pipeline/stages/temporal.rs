use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;
use evaluations::temporal::evaluate_temporal;

/// How the batch spreads over time: coverage, ages, ISO-week buckets,
/// recency.
pub struct TemporalStage;

#[async_trait]
impl PipelineStage for TemporalStage {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn description(&self) -> &'static str {
        "Compute temporal distribution metrics"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Temporal)
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_validation
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        _services: &PipelineServices,
    ) -> Result<(), AppError> {
        let report = evaluate_temporal(&ctx.objects, Utc::now());
        info!(
            objects = report.object_count,
            dated = report.dated_object_count,
            coverage_days = report.coverage_days,
            recency = report.recency_score,
            "temporal evaluation completed"
        );

        ctx.stats.temporal = Some(report);
        Ok(())
    }
}
