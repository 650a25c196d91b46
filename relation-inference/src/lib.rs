mod contrastive;
mod duplicates;
mod explicit;
mod keywords;
mod similarity;
mod stats;

pub use contrastive::{parse_judgment, DEFAULT_PROMPT_TEMPLATE};
pub use duplicates::detect_duplicates;
pub use explicit::extract_explicit;
pub use keywords::{jaccard, keyword_set, shared_keywords};
pub use stats::{relation_stats, relations_by_type, relations_for, Direction, RelationStats};

use std::collections::HashMap;
use std::sync::Arc;

use common::error::AppError;
use common::storage::types::{canonical_object::CanonicalObject, relation::Relation};
use common::utils::config::RelationInferenceConfig;
use common::utils::llm::ChatBackend;

/// Derives the typed relation set for a corpus: explicit structural edges,
/// exact duplicates, and similarity edges from keyword overlap, hybrid
/// embedding scoring, or contrastive LLM judgments.
pub struct RelationInferrer {
    config: RelationInferenceConfig,
    chat: Option<Arc<dyn ChatBackend>>,
}

impl RelationInferrer {
    pub fn new(config: RelationInferenceConfig) -> Result<Self, AppError> {
        Self::validate(&config, false)?;
        Ok(Self { config, chat: None })
    }

    pub fn with_chat_backend(
        config: RelationInferenceConfig,
        chat: Arc<dyn ChatBackend>,
    ) -> Result<Self, AppError> {
        Self::validate(&config, true)?;
        Ok(Self {
            config,
            chat: Some(chat),
        })
    }

    pub fn config(&self) -> &RelationInferenceConfig {
        &self.config
    }

    /// Construction-time checks; everything past this point is total over
    /// its inputs.
    fn validate(config: &RelationInferenceConfig, has_chat: bool) -> Result<(), AppError> {
        for (field, value) in [
            ("similarityThreshold", config.similarity_threshold),
            ("keywordOverlapThreshold", config.keyword_overlap_threshold),
            ("semanticWeight", config.semantic_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "relation inference {field} must be within [0, 1], got {value}"
                )));
            }
        }
        if config.use_contrastive_icl {
            if config.llm_config.is_none() {
                return Err(AppError::Config(
                    "contrastive inference requires llmConfig".into(),
                ));
            }
            if !has_chat {
                return Err(AppError::Config(
                    "contrastive inference requires a chat backend".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn detect_duplicates(&self, objects: &[CanonicalObject]) -> Vec<Relation> {
        if !self.config.enable_duplicate_detection {
            return Vec::new();
        }
        duplicates::detect_duplicates(objects)
    }

    pub fn infer_similarity(&self, objects: &[CanonicalObject]) -> Vec<Relation> {
        similarity::infer_similarity(&self.config, objects)
    }

    pub fn infer_similarity_with_embeddings(
        &self,
        objects: &[CanonicalObject],
        embeddings: &HashMap<String, Vec<f32>>,
    ) -> Vec<Relation> {
        similarity::infer_similarity_with_embeddings(&self.config, objects, embeddings)
    }

    pub async fn infer_similarity_with_contrastive_icl(
        &self,
        objects: &[CanonicalObject],
    ) -> Result<Vec<Relation>, AppError> {
        let chat = self.chat.as_deref().ok_or_else(|| {
            AppError::Config("contrastive inference requires a chat backend".into())
        })?;
        contrastive::infer_similarity_with_contrastive_icl(&self.config, chat, objects).await
    }

    /// Explicit ∪ duplicates ∪ keyword similarity. `include_inferred`
    /// gates everything past the explicit pass.
    pub fn infer_all(&self, objects: &[CanonicalObject]) -> Vec<Relation> {
        let mut relations = explicit::extract_explicit(objects);
        if self.config.include_inferred {
            relations.extend(self.detect_duplicates(objects));
            relations.extend(self.infer_similarity(objects));
        }
        relations
    }

    /// Explicit ∪ duplicates ∪ hybrid embedding similarity.
    pub fn infer_all_with_embeddings(
        &self,
        objects: &[CanonicalObject],
        embeddings: &HashMap<String, Vec<f32>>,
    ) -> Vec<Relation> {
        let mut relations = explicit::extract_explicit(objects);
        if self.config.include_inferred {
            relations.extend(self.detect_duplicates(objects));
            relations.extend(self.infer_similarity_with_embeddings(objects, embeddings));
        }
        relations
    }

    /// Explicit ∪ duplicates ∪ LLM-judged similarity.
    pub async fn infer_all_with_contrastive_icl(
        &self,
        objects: &[CanonicalObject],
    ) -> Result<Vec<Relation>, AppError> {
        let mut relations = explicit::extract_explicit(objects);
        if self.config.include_inferred {
            relations.extend(self.detect_duplicates(objects));
            relations.extend(self.infer_similarity_with_contrastive_icl(objects).await?);
        }
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::canonical_object::OneOrMany;
    use common::storage::types::relation::{RelationSource, RelationType};
    use serde_json::json;

    fn object(id: &str, keywords: &[&str], hash: Option<&str>) -> CanonicalObject {
        let mut object = CanonicalObject::new(id, "slack", "thread");
        if !keywords.is_empty() {
            object
                .properties
                .insert("keywords".to_string(), json!(keywords));
        }
        object.semantic_hash = hash.map(str::to_owned);
        object
    }

    #[test]
    fn test_new_rejects_out_of_range_thresholds() {
        let config = RelationInferenceConfig {
            similarity_threshold: 1.2,
            ..RelationInferenceConfig::default()
        };
        assert!(matches!(
            RelationInferrer::new(config),
            Err(AppError::Config(_))
        ));

        let config = RelationInferenceConfig {
            semantic_weight: -0.5,
            ..RelationInferenceConfig::default()
        };
        assert!(RelationInferrer::new(config).is_err());
    }

    #[test]
    fn test_new_rejects_contrastive_without_backend() {
        let config = RelationInferenceConfig {
            use_contrastive_icl: true,
            llm_config: Some(common::utils::config::LlmOptions {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.0,
                max_tokens: 8,
                api_key: None,
            }),
            ..RelationInferenceConfig::default()
        };
        assert!(matches!(
            RelationInferrer::new(config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_infer_all_unions_sources() {
        let inferrer =
            RelationInferrer::new(RelationInferenceConfig::default()).expect("inferrer");
        let hash = "f".repeat(64);
        let mut first = object("a|w|t|1", &["api", "rate", "limit"], Some(&hash));
        first.actors.insert(
            "created_by".to_string(),
            OneOrMany::One("user|w|user|U1".to_string()),
        );
        let objects = vec![
            first,
            object("b|w|t|2", &["api", "rate", "limit"], Some(&hash)),
        ];

        let relations = inferrer.infer_all(&objects);

        assert!(relations
            .iter()
            .any(|r| r.relation_type == RelationType::CreatedBy
                && r.source == RelationSource::Explicit));
        assert!(relations
            .iter()
            .any(|r| r.relation_type == RelationType::DuplicateOf));
        assert_eq!(
            relations
                .iter()
                .filter(|r| r.relation_type == RelationType::SimilarTo)
                .count(),
            2
        );
    }

    #[test]
    fn test_include_inferred_false_keeps_only_explicit() {
        let config = RelationInferenceConfig {
            include_inferred: false,
            ..RelationInferenceConfig::default()
        };
        let inferrer = RelationInferrer::new(config).expect("inferrer");
        let hash = "f".repeat(64);
        let objects = vec![
            object("a|w|t|1", &["api", "rate", "limit"], Some(&hash)),
            object("b|w|t|2", &["api", "rate", "limit"], Some(&hash)),
        ];

        assert!(inferrer.infer_all(&objects).is_empty());
    }

    #[test]
    fn test_duplicate_detection_switch() {
        let config = RelationInferenceConfig {
            enable_duplicate_detection: false,
            ..RelationInferenceConfig::default()
        };
        let inferrer = RelationInferrer::new(config).expect("inferrer");
        let hash = "f".repeat(64);
        let objects = vec![
            object("a|w|t|1", &[], Some(&hash)),
            object("b|w|t|2", &[], Some(&hash)),
        ];
        assert!(inferrer.detect_duplicates(&objects).is_empty());
    }

    #[test]
    fn test_explicit_confidence_invariant() {
        let mut first = object("a|w|t|1", &[], None);
        first.relations.insert(
            "triggered_by_ticket".to_string(),
            OneOrMany::One("zendesk|w|ticket|Z1".to_string()),
        );
        let relations = extract_explicit(&[first]);
        assert!(relations
            .iter()
            .all(|r| (r.confidence - 1.0).abs() < f64::EPSILON));
    }
}
