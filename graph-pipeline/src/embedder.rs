use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::info;

use common::error::AppError;
use common::utils::config::EmbeddingConfig;
use common::utils::embedding::EmbeddingBackend;

/// USD per million tokens for the default embedding tier.
const PRICE_PER_MILLION_DEFAULT: f64 = 0.02;

/// USD per million tokens for the large tier.
const PRICE_PER_MILLION_LARGE: f64 = 0.13;

/// Progress is logged every this many embedded texts.
const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedText {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Per-text estimate; the batch total below is provider-reported.
    pub tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingOutput {
    pub results: Vec<EmbeddedText>,
    pub total_tokens: u64,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingStats {
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// Batched embedding with order preservation and cost accounting. Inputs
/// are sent in groups of at most `batch_size`; a failed group fails the
/// whole invocation after the retry budget is spent.
pub struct EmbedderAdapter {
    backend: Arc<dyn EmbeddingBackend>,
    config: EmbeddingConfig,
}

impl EmbedderAdapter {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, config: EmbeddingConfig) -> Result<Self, AppError> {
        if config.batch_size == 0 {
            return Err(AppError::Config("embedding batchSize must be positive".into()));
        }
        Ok(Self { backend, config })
    }

    pub fn dimensions(&self) -> Option<u32> {
        self.config.dimensions
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// `tokens / 1e6 · price`; the large tier is priced separately.
    pub fn estimate_cost(&self, total_tokens: u64) -> f64 {
        let price = if self.config.model.contains("large") {
            PRICE_PER_MILLION_LARGE
        } else {
            PRICE_PER_MILLION_DEFAULT
        };
        #[allow(clippy::cast_precision_loss)]
        {
            total_tokens as f64 / 1_000_000.0 * price
        }
    }

    pub async fn embed(&self, text: &str) -> Result<EmbeddedText, AppError> {
        let output = self.embed_batch(&[text.to_owned()]).await?;
        output
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Provider("embedding backend returned no vector".into()))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingOutput, AppError> {
        let mut results: Vec<EmbeddedText> = Vec::with_capacity(texts.len());
        let mut total_tokens = 0u64;

        for group in texts.chunks(self.config.batch_size) {
            let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
            let batch = Retry::spawn(retry_strategy, || {
                self.backend
                    .embed_batch(group, &self.config.model, self.config.dimensions)
            })
            .await?;

            if batch.vectors.len() != group.len() {
                return Err(AppError::Provider(format!(
                    "embedding backend returned {} vectors for {} inputs",
                    batch.vectors.len(),
                    group.len()
                )));
            }

            total_tokens += batch.total_tokens;
            for (text, embedding) in group.iter().zip(batch.vectors) {
                results.push(EmbeddedText {
                    tokens: approximate_tokens(text),
                    text: text.clone(),
                    embedding,
                });
            }

            if results.len() % PROGRESS_INTERVAL < group.len() && results.len() >= PROGRESS_INTERVAL
            {
                info!(
                    embedded = results.len(),
                    total = texts.len(),
                    "embedding progress"
                );
            }
        }

        Ok(EmbeddingOutput {
            results,
            total_tokens,
            model: self.config.model.clone(),
        })
    }
}

fn approximate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4).max(1)
}
