pub mod graph;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::error::AppError;
use common::storage::store::Store;
use common::storage::types::relation::Relation;
use common::utils::config::{EmbeddingConfig, RetrievalConfig};
use common::utils::embedding::EmbeddingBackend;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub canonical_object_id: String,
    pub content: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalStats {
    pub retrieval_time_ms: f64,
    /// Hits from the vector cut alone.
    pub vector_hits: usize,
    /// Chunks unioned in through relation expansion.
    pub relation_hits: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalOutput {
    pub chunks: Vec<RetrievedChunk>,
    pub stats: RetrievalStats,
}

/// Vector + relation-aware chunk lookup over the store. The query is
/// embedded exactly once per call.
pub struct Retriever {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingBackend>,
    embedding: EmbeddingConfig,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingBackend>,
        embedding: EmbeddingConfig,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding,
            config,
        }
    }

    pub async fn retrieve(&self, query_text: &str) -> Result<RetrievalOutput, AppError> {
        self.retrieve_with_relations(query_text, &[]).await
    }

    /// Vector cut first; when relation expansion is enabled, chunks of
    /// every object reachable within `relation_depth` hops are unioned in
    /// after the cut. The vector hits keep their similarity order with
    /// insertion order as tiebreak; expanded chunks follow them.
    pub async fn retrieve_with_relations(
        &self,
        query_text: &str,
        relations: &[Relation],
    ) -> Result<RetrievalOutput, AppError> {
        let started = Instant::now();

        let batch = self
            .embedder
            .embed_batch(
                &[query_text.to_owned()],
                &self.embedding.model,
                self.embedding.dimensions,
            )
            .await?;
        let query_embedding = batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Provider("embedding backend returned no query vector".into()))?;

        let hits = self
            .store
            .nearest_chunks(
                &query_embedding,
                self.config.similarity_threshold,
                self.config.chunk_limit,
            )
            .await?;
        let vector_hits = hits.len();

        let mut chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                canonical_object_id: hit.canonical_object_id,
                content: hit.content,
                similarity: hit.similarity,
            })
            .collect();

        let mut relation_hits = 0usize;
        if self.config.include_relations && !relations.is_empty() {
            let seeds: HashSet<String> = chunks
                .iter()
                .map(|chunk| chunk.canonical_object_id.clone())
                .collect();
            let mut reached: Vec<String> =
                graph::reachable_objects(&seeds, relations, self.config.relation_depth)
                    .into_iter()
                    .collect();
            reached.sort_unstable();

            for object_id in reached {
                for chunk in self.store.list_chunks_by_object_id(&object_id).await? {
                    relation_hits += 1;
                    chunks.push(RetrievedChunk {
                        canonical_object_id: chunk.canonical_object_id,
                        content: chunk.content,
                        similarity: 0.0,
                    });
                }
            }
        }

        let retrieval_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            query_chars = query_text.chars().count(),
            vector_hits,
            relation_hits,
            retrieval_time_ms,
            "retrieval completed"
        );

        Ok(RetrievalOutput {
            chunks,
            stats: RetrievalStats {
                retrieval_time_ms,
                vector_hits,
                relation_hits,
            },
        })
    }
}
