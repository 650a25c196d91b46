use std::collections::HashMap;

use serde_json::json;
use tracing::{info, warn};

use common::error::AppError;
use common::storage::types::{
    canonical_object::CanonicalObject,
    relation::{Relation, RelationSource, RelationType},
};
use common::utils::config::{ContrastiveExamples, ExamplePair, RelationInferenceConfig};
use common::utils::llm::{ChatBackend, ChatRequest};

/// Confidence assigned to an LLM-judged pair.
const CONTRASTIVE_CONFIDENCE: f64 = 0.9;

/// Character cap applied to each object's text before it enters a prompt.
const CHUNK_CHAR_LIMIT: usize = 1200;

/// Progress is logged every this many judged pairs.
const PROGRESS_INTERVAL: usize = 10;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You classify whether two workplace artifacts discuss the same underlying topic.

Examples of RELATED pairs:
{{positiveExamples}}

Examples of NOT_RELATED pairs:
{{negativeExamples}}

Artifact 1:
{{chunk1}}

Artifact 2:
{{chunk2}}

Answer with exactly one token: RELATED or NOT_RELATED.";

/// Judge every unordered pair with one LLM call each. `O(N²)` calls is the
/// intended cost; an error for a pair yields no relation for that pair.
pub async fn infer_similarity_with_contrastive_icl(
    config: &RelationInferenceConfig,
    chat: &dyn ChatBackend,
    objects: &[CanonicalObject],
) -> Result<Vec<Relation>, AppError> {
    let llm = config.llm_config.as_ref().ok_or_else(|| {
        AppError::Config("contrastive inference requires llmConfig".into())
    })?;

    let template = config
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE);

    let total_pairs = objects.len().saturating_mul(objects.len().saturating_sub(1)) / 2;
    let mut relations = Vec::new();
    let mut processed = 0usize;

    for (i, a) in objects.iter().enumerate() {
        for b in objects.iter().skip(i + 1) {
            let prompt = render_prompt(template, &config.contrastive_examples, a, b);
            let prompt_length = prompt.chars().count();

            let request = ChatRequest {
                model: llm.model.clone(),
                prompt,
                temperature: llm.temperature,
                max_tokens: llm.max_tokens,
            };

            match chat.complete(request).await {
                Ok(response) => {
                    if parse_judgment(&response) {
                        let mut metadata = HashMap::new();
                        metadata.insert("method".to_string(), json!("contrastive_icl"));
                        metadata.insert("model".to_string(), json!(llm.model));
                        metadata.insert("prompt_length".to_string(), json!(prompt_length));
                        push_pair(&mut relations, a, b, metadata);
                    }
                }
                Err(err) => {
                    warn!(
                        from_id = %a.id,
                        to_id = %b.id,
                        error = %err,
                        "contrastive judgment failed; skipping pair"
                    );
                }
            }

            processed += 1;
            if processed % PROGRESS_INTERVAL == 0 {
                info!(processed, total_pairs, "contrastive inference progress");
            }
        }
    }

    Ok(relations)
}

/// A response counts as RELATED when it contains the token and is not a
/// NOT_RELATED verdict; matching is case-insensitive.
pub fn parse_judgment(response: &str) -> bool {
    let upper = response.to_uppercase();
    upper.contains("RELATED") && !upper.contains("NOT_RELATED")
}

fn render_prompt(
    template: &str,
    examples: &ContrastiveExamples,
    a: &CanonicalObject,
    b: &CanonicalObject,
) -> String {
    template
        .replace("{{positiveExamples}}", &render_examples(&examples.positive))
        .replace("{{negativeExamples}}", &render_examples(&examples.negative))
        .replace("{{chunk1}}", &object_text(a))
        .replace("{{chunk2}}", &object_text(b))
}

fn render_examples(pairs: &[ExamplePair]) -> String {
    if pairs.is_empty() {
        return "(none)".to_string();
    }
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| format!("{}. \"{}\" <-> \"{}\"", i + 1, pair.first, pair.second))
        .collect::<Vec<_>>()
        .join("\n")
}

fn object_text(object: &CanonicalObject) -> String {
    let text = object.combined_text();
    if text.chars().count() <= CHUNK_CHAR_LIMIT {
        return text;
    }
    text.chars().take(CHUNK_CHAR_LIMIT).collect()
}

fn push_pair(
    relations: &mut Vec<Relation>,
    a: &CanonicalObject,
    b: &CanonicalObject,
    metadata: HashMap<String, serde_json::Value>,
) {
    let created_at = a.created_at();
    relations.push(
        Relation::new(
            &a.id,
            &b.id,
            RelationType::SimilarTo,
            RelationSource::Inferred,
            CONTRASTIVE_CONFIDENCE,
        )
        .with_metadata(metadata.clone())
        .with_created_at(created_at),
    );
    relations.push(
        Relation::new(
            &b.id,
            &a.id,
            RelationType::SimilarTo,
            RelationSource::Inferred,
            CONTRASTIVE_CONFIDENCE,
        )
        .with_metadata(metadata)
        .with_created_at(created_at),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::utils::config::LlmOptions;
    use std::sync::Mutex;

    struct ScriptedChat {
        responses: Mutex<Vec<Result<String, AppError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(responses: Vec<Result<String, AppError>>) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self {
                responses: Mutex::new(reversed),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedChat {
        async fn complete(&self, request: ChatRequest) -> Result<String, AppError> {
            self.prompts.lock().expect("lock").push(request.prompt);
            self.responses
                .lock()
                .expect("lock")
                .pop()
                .unwrap_or_else(|| Err(AppError::Provider("script exhausted".into())))
        }
    }

    fn contrastive_config() -> RelationInferenceConfig {
        RelationInferenceConfig {
            use_contrastive_icl: true,
            llm_config: Some(LlmOptions {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.0,
                max_tokens: 8,
                api_key: None,
            }),
            contrastive_examples: ContrastiveExamples {
                positive: vec![ExamplePair {
                    first: "rate limit errors".to_string(),
                    second: "API throttling ticket".to_string(),
                }],
                negative: vec![ExamplePair {
                    first: "holiday schedule".to_string(),
                    second: "database migration".to_string(),
                }],
            },
            ..RelationInferenceConfig::default()
        }
    }

    fn object(id: &str, body: &str) -> CanonicalObject {
        let mut object = CanonicalObject::new(id, "slack", "thread");
        object.body = Some(body.to_string());
        object
    }

    #[test]
    fn test_parse_judgment_is_case_insensitive() {
        assert!(parse_judgment("RELATED"));
        assert!(parse_judgment("related"));
        assert!(parse_judgment("The pair is Related."));
        assert!(!parse_judgment("NOT_RELATED"));
        assert!(!parse_judgment("not_related"));
        assert!(!parse_judgment("nothing useful"));
    }

    #[tokio::test]
    async fn test_related_verdict_emits_bidirectional_pair() {
        let config = contrastive_config();
        let chat = ScriptedChat::new(vec![Ok("RELATED".to_string())]);
        let objects = vec![object("a|w|t|1", "rate limits"), object("b|w|t|2", "throttling")];

        let relations = infer_similarity_with_contrastive_icl(&config, &chat, &objects)
            .await
            .expect("inference");

        assert_eq!(relations.len(), 2);
        for relation in &relations {
            assert_eq!(relation.relation_type, RelationType::SimilarTo);
            assert_eq!(relation.source, RelationSource::Inferred);
            assert!((relation.confidence - 0.9).abs() < f64::EPSILON);
            assert_eq!(
                relation.metadata.get("method"),
                Some(&json!("contrastive_icl"))
            );
            assert_eq!(relation.metadata.get("model"), Some(&json!("gpt-4o-mini")));
            assert!(relation.metadata.contains_key("prompt_length"));
        }
        assert_eq!(relations[0].metadata, relations[1].metadata);
    }

    #[tokio::test]
    async fn test_not_related_verdict_emits_nothing() {
        let config = contrastive_config();
        let chat = ScriptedChat::new(vec![Ok("NOT_RELATED".to_string())]);
        let objects = vec![object("a|w|t|1", "x"), object("b|w|t|2", "y")];

        let relations = infer_similarity_with_contrastive_icl(&config, &chat, &objects)
            .await
            .expect("inference");
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn test_pair_errors_are_swallowed() {
        let config = contrastive_config();
        // Pairs are judged in order (1,2), (1,3), (2,3).
        let chat = ScriptedChat::new(vec![
            Ok("RELATED".to_string()),
            Err(AppError::Provider("rate limited".into())),
            Ok("RELATED".to_string()),
        ]);
        let objects = vec![
            object("a|w|t|1", "x"),
            object("b|w|t|2", "y"),
            object("c|w|t|3", "z"),
        ];

        let relations = infer_similarity_with_contrastive_icl(&config, &chat, &objects)
            .await
            .expect("inference");

        // Two surviving pairs, each bidirectional.
        assert_eq!(relations.len(), 4);
        assert!(relations
            .iter()
            .any(|r| r.from_id == "a|w|t|1" && r.to_id == "b|w|t|2"));
        assert!(relations
            .iter()
            .any(|r| r.from_id == "b|w|t|2" && r.to_id == "c|w|t|3"));
        assert!(!relations
            .iter()
            .any(|r| r.from_id == "a|w|t|1" && r.to_id == "c|w|t|3"));
    }

    #[tokio::test]
    async fn test_prompt_renders_examples_and_chunks() {
        let config = contrastive_config();
        let chat = ScriptedChat::new(vec![Ok("NOT_RELATED".to_string())]);
        let objects = vec![
            object("a|w|t|1", "checkout latency spike"),
            object("b|w|t|2", "billing outage"),
        ];

        infer_similarity_with_contrastive_icl(&config, &chat, &objects)
            .await
            .expect("inference");

        let prompts = chat.prompts.lock().expect("lock");
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("rate limit errors"));
        assert!(prompt.contains("holiday schedule"));
        assert!(prompt.contains("checkout latency spike"));
        assert!(prompt.contains("billing outage"));
        assert!(!prompt.contains("{{chunk1}}"));
        assert!(!prompt.contains("{{positiveExamples}}"));
    }

    #[tokio::test]
    async fn test_missing_llm_config_is_a_config_error() {
        let config = RelationInferenceConfig::default();
        let chat = ScriptedChat::new(Vec::new());
        let result =
            infer_similarity_with_contrastive_icl(&config, &chat, &[object("a|w|t|1", "x")]).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
