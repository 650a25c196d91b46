use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use common::error::AppError;
use common::storage::types::activity::{ActivityRecord, ActivityStatus};

use crate::pipeline::context::{PipelineContext, StorageStats};
use crate::pipeline::services::PipelineServices;
use crate::pipeline::{log_activity, PipelineStage};

/// Replaces every batch object's chunks in the store: delete all existing
/// rows per object id, then insert the fresh set with embeddings. This is
/// the only chunk mutation surface the pipeline has.
pub struct StorageStage;

#[async_trait]
impl PipelineStage for StorageStage {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn description(&self) -> &'static str {
        "Persist chunks and embeddings with per-object replacement"
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        !ctx.options.skip_storage
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        _services: &PipelineServices,
    ) -> Result<(), AppError> {
        if ctx.chunks.is_empty() {
            return Err(AppError::Input("storage requires chunks".into()));
        }
        if ctx.embeddings.is_empty() {
            return Err(AppError::Input("storage requires embeddings".into()));
        }

        let object_ids = ctx.object_ids();
        ctx.store.delete_chunks_by_object_ids(&object_ids).await?;

        let mut chunks_stored = 0usize;
        for chunk in &ctx.chunks {
            let mut stored = chunk.clone();
            match ctx.embeddings.get(&chunk.id) {
                Some(embedding) => stored.embedding = Some(embedding.clone()),
                None => {
                    warn!(chunk_id = %chunk.id, "no embedding for chunk; storing without vector");
                }
            }
            ctx.store.insert_chunk(stored).await?;
            chunks_stored += 1;
        }

        let stats = StorageStats {
            objects_replaced: object_ids.len(),
            chunks_stored,
        };

        info!(
            objects = stats.objects_replaced,
            chunks = stats.chunks_stored,
            "storage completed"
        );

        log_activity(
            ctx.store.as_ref(),
            ActivityRecord::new(
                "pipeline",
                "store_chunks",
                format!(
                    "Replaced chunks for {} objects ({} chunks)",
                    stats.objects_replaced, stats.chunks_stored
                ),
                ActivityStatus::Completed,
                ctx.options.triggered_by(),
            )
            .with_details(json!({
                "objects": stats.objects_replaced,
                "chunks": stats.chunks_stored,
            }))
            .with_experiment_id(ctx.experiment_id.clone()),
        )
        .await;

        ctx.stats.storage = Some(stats);
        Ok(())
    }
}
