mod chunking;
mod consolidation;
mod embedding;
mod graph;
mod retrieval;
mod storage;
mod temporal;
mod validation;

pub use chunking::ChunkingStage;
pub use consolidation::ConsolidationStage;
pub use embedding::EmbeddingStage;
pub use graph::GraphStage;
pub use retrieval::RetrievalStage;
pub use storage::StorageStage;
pub use temporal::TemporalStage;
pub use validation::ValidationStage;
