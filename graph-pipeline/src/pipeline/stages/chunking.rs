use async_trait::async_trait;
use tracing::info;

use common::error::AppError;
use common::storage::types::experiment::Layer;

use crate::chunker::Chunker;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::services::PipelineServices;
use crate::pipeline::PipelineStage;

/// Splits every object in the batch into ordered chunks.
pub struct ChunkingStage;

#[async_trait]
impl PipelineStage for ChunkingStage {
    fn name(&self) -> &'static str {
        "chunking"
    }

    fn description(&self) -> &'static str {
        "Split canonical objects into retrievable chunks"
    }

    fn layer(&self) -> Option<Layer> {
        Some(Layer::Chunking)
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        _services: &PipelineServices,
    ) -> Result<(), AppError> {
        if ctx.objects.is_empty() {
            return Err(AppError::Input("chunking requires canonical objects".into()));
        }

        let chunker = Chunker::new(ctx.config.chunking.clone())?;
        ctx.chunks = chunker.chunk_objects(&ctx.objects);
        let stats = Chunker::stats(&ctx.chunks);

        info!(
            objects = ctx.objects.len(),
            chunks = stats.total_chunks,
            strategy = %ctx.config.chunking.strategy,
            "chunking completed"
        );

        ctx.stats.chunking = Some(stats);
        Ok(())
    }
}
