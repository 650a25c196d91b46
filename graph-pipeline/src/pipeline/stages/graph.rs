use async_trait::async_trait;
use tracing::info;

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;
use evaluations::graph::evaluate_graph;

/// Topology metrics over the inferred relation set.
pub struct GraphStage;

#[async_trait]
impl PipelineStage for GraphStage {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn description(&self) -> &'static str {
        "Compute relation-graph topology metrics"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Graph)
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_validation && ctx.inferred_relations.is_some()
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        _services: &PipelineServices,
    ) -> Result<(), AppError> {
        let relations = ctx
            .inferred_relations
            .as_deref()
            .ok_or_else(|| AppError::Input("graph evaluation requires inferred relations".into()))?;

        let report = evaluate_graph(relations);
        info!(
            nodes = report.node_count,
            edges = report.edge_count,
            components = report.connected_components,
            density = report.graph_density,
            "graph evaluation completed"
        );

        ctx.stats.graph = Some(report);
        Ok(())
    }
}
