use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;
use evaluations::retrieval::{aggregate_queries, evaluate_query, QueryMetrics, RelevanceMap};
use retrieval_pipeline::Retriever;

/// Runs the ground-truth queries for the experiment's first scenario and
/// scores the retriever with NDCG@10, MRR, P@5 and R@10.
pub struct RetrievalStage;

#[async_trait]
impl PipelineStage for RetrievalStage {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    fn description(&self) -> &'static str {
        "Evaluate retrieval quality against ground-truth queries"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Retrieval)
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_validation && ctx.config.validation.run_on_save
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        services: &PipelineServices,
    ) -> Result<(), AppError> {
        let scenario = ctx.config.first_scenario().to_owned();
        let queries = ctx.store.list_ground_truth_queries(&scenario).await?;
        if queries.is_empty() {
            info!(scenario = %scenario, "no ground-truth queries; retrieval metrics empty");
            ctx.stats.retrieval = Some(aggregate_queries(&[]));
            return Ok(());
        }

        let retriever = Retriever::new(
            Arc::clone(&ctx.store),
            services.embedder.clone(),
            ctx.config.embedding.clone(),
            ctx.config.retrieval.clone(),
        );
        let relations = ctx.inferred_relations.clone().unwrap_or_default();

        let mut per_query: Vec<QueryMetrics> = Vec::with_capacity(queries.len());
        for query in &queries {
            let output = retriever
                .retrieve_with_relations(&query.query_text, &relations)
                .await?;
            let retrieved: Vec<String> = output
                .chunks
                .iter()
                .map(|chunk| chunk.canonical_object_id.clone())
                .collect();
            let expected: RelevanceMap = query
                .expected_results
                .iter()
                .map(|result| (result.canonical_object_id.clone(), result.relevance_score))
                .collect();

            let metrics = evaluate_query(
                &query.id,
                &retrieved,
                &expected,
                output.stats.retrieval_time_ms,
            );
            debug!(
                query_id = %query.id,
                ndcg = metrics.ndcg_at_10,
                mrr = metrics.mrr,
                "query evaluated"
            );
            per_query.push(metrics);
        }

        let report = aggregate_queries(&per_query);
        info!(
            scenario = %scenario,
            queries = report.query_count,
            avg_ndcg = report.avg_ndcg_at_10,
            avg_mrr = report.avg_mrr,
            "retrieval evaluation completed"
        );

        ctx.stats.retrieval = Some(report);
        Ok(())
    }
}
