use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use tracing::debug;

use crate::error::AppError;

/// Ordered output of one batched embedding call.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
    pub model: String,
}

/// Batched text → vector oracle. One call embeds one provider-sized batch;
/// the adapter above this trait handles splitting and cost accounting.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn backend_label(&self) -> &'static str;

    async fn embed_batch(
        &self,
        texts: &[String],
        model: &str,
        dimensions: Option<u32>,
    ) -> Result<EmbeddingBatch, AppError>;
}

/// OpenAI-compatible embedding backend.
pub struct OpenAiEmbeddings {
    client: Client<OpenAIConfig>,
}

impl OpenAiEmbeddings {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    pub fn from_api(api_key: &str, base_url: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.to_owned())
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    fn backend_label(&self) -> &'static str {
        "openai"
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        model: &str,
        dimensions: Option<u32>,
    ) -> Result<EmbeddingBatch, AppError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                total_tokens: 0,
                model: model.to_owned(),
            });
        }

        let mut builder = CreateEmbeddingRequestArgs::default();
        builder.model(model).input(texts.to_vec());
        if let Some(dimensions) = dimensions {
            builder.dimensions(dimensions);
        }
        let request = builder.build()?;

        let response = self.client.embeddings().create(request).await?;

        if response.data.len() != texts.len() {
            return Err(AppError::Provider(format!(
                "embedding response returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        // The API tags each vector with its input index; restore input order.
        let mut data = response.data;
        data.sort_by_key(|entry| entry.index);
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|entry| entry.embedding).collect();

        debug!(
            inputs = texts.len(),
            total_tokens = response.usage.total_tokens,
            model,
            "embedding batch completed"
        );

        Ok(EmbeddingBatch {
            vectors,
            total_tokens: u64::from(response.usage.total_tokens),
            model: model.to_owned(),
        })
    }
}

/// Deterministic token-bucket embedding backend. No network, stable across
/// runs, good enough to exercise every vector code path in tests and
/// offline runs.
pub struct HashedEmbeddings {
    dimension: usize,
}

impl HashedEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl EmbeddingBackend for HashedEmbeddings {
    fn backend_label(&self) -> &'static str {
        "hashed"
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        model: &str,
        dimensions: Option<u32>,
    ) -> Result<EmbeddingBatch, AppError> {
        let dimension = dimensions.map_or(self.dimension, |d| d.max(1) as usize);
        let vectors = texts
            .iter()
            .map(|text| hashed_embedding(text, dimension))
            .collect();
        let total_tokens = texts.iter().map(|text| approximate_tokens(text)).sum();

        Ok(EmbeddingBatch {
            vectors,
            total_tokens,
            model: model.to_owned(),
        })
    }
}

fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    let mut token_count = 0.0f32;

    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dimension);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension.max(1)
}

/// Rough chars/4 token estimate for offline cost accounting.
fn approximate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4).max(1)
}
