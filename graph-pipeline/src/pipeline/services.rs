use std::sync::Arc;

use common::utils::embedding::EmbeddingBackend;
use common::utils::llm::ChatBackend;

/// Provider handles the stages share. The store handle lives on the
/// context; these are the outbound oracles.
#[derive(Clone)]
pub struct PipelineServices {
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub chat: Option<Arc<dyn ChatBackend>>,
}

impl PipelineServices {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            embedder,
            chat: None,
        }
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(chat);
        self
    }
}
