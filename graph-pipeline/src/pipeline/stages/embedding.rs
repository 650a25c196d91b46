use async_trait::async_trait;
use tracing::info;

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::embedder::{EmbedderAdapter, EmbeddingStats};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;

/// Embeds every chunk in batches and records token cost.
pub struct EmbeddingStage;

#[async_trait]
impl PipelineStage for EmbeddingStage {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn description(&self) -> &'static str {
        "Generate vector embeddings for all chunks"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Embedding)
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        services: &PipelineServices,
    ) -> Result<(), AppError> {
        if ctx.chunks.is_empty() {
            return Err(AppError::Input("embedding requires chunks".into()));
        }

        let adapter = EmbedderAdapter::new(
            services.embedder.clone(),
            ctx.config.embedding.clone(),
        )?;

        let texts: Vec<String> = ctx.chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let output = adapter.embed_batch(&texts).await?;

        ctx.embeddings = ctx
            .chunks
            .iter()
            .zip(output.results)
            .map(|(chunk, result)| (chunk.id.clone(), result.embedding))
            .collect();

        let stats = EmbeddingStats {
            total_tokens: output.total_tokens,
            cost_usd: adapter.estimate_cost(output.total_tokens),
        };

        info!(
            chunks = ctx.chunks.len(),
            total_tokens = stats.total_tokens,
            cost_usd = stats.cost_usd,
            model = %output.model,
            "embedding completed"
        );

        ctx.stats.embedding = Some(stats);
        Ok(())
    }
}
