use std::collections::{BTreeSet, HashMap};

use serde_json::json;

use common::storage::types::{
    canonical_object::CanonicalObject,
    relation::{Relation, RelationSource, RelationType},
};
use common::utils::config::RelationInferenceConfig;
use common::utils::vector::cosine_similarity;

use crate::keywords::{jaccard, keyword_set, shared_keywords};

/// Keyword-only similarity: Jaccard over keyword profiles, emitted
/// bidirectionally above `keyword_overlap_threshold`.
pub fn infer_similarity(
    config: &RelationInferenceConfig,
    objects: &[CanonicalObject],
) -> Vec<Relation> {
    let profiles = keyword_profiles(objects);
    let mut relations = Vec::new();

    for (i, a) in objects.iter().enumerate() {
        for b in objects.iter().skip(i + 1) {
            let (Some(set_a), Some(set_b)) = (profiles.get(&a.id), profiles.get(&b.id)) else {
                continue;
            };
            if set_a.is_empty() || set_b.is_empty() {
                continue;
            }

            let score = jaccard(set_a, set_b);
            if score >= config.keyword_overlap_threshold {
                let mut metadata = HashMap::new();
                metadata.insert(
                    "shared_keywords".to_string(),
                    json!(shared_keywords(set_a, set_b)),
                );
                metadata.insert("keyword_overlap_score".to_string(), json!(score));
                push_bidirectional(&mut relations, a, b, score, metadata);
            }
        }
    }

    relations
}

/// Hybrid similarity. When both sides have embeddings and semantic mode is
/// on, the combined score is `w·cos + (1−w)·J` cut at
/// `similarity_threshold`; otherwise the pair degrades to pure keyword
/// Jaccard cut at `keyword_overlap_threshold`.
pub fn infer_similarity_with_embeddings(
    config: &RelationInferenceConfig,
    objects: &[CanonicalObject],
    embeddings: &HashMap<String, Vec<f32>>,
) -> Vec<Relation> {
    let profiles = keyword_profiles(objects);
    let mut relations = Vec::new();

    for (i, a) in objects.iter().enumerate() {
        for b in objects.iter().skip(i + 1) {
            let (Some(set_a), Some(set_b)) = (profiles.get(&a.id), profiles.get(&b.id)) else {
                continue;
            };
            if set_a.is_empty() || set_b.is_empty() {
                continue;
            }

            let keyword_score = jaccard(set_a, set_b);
            let embedding_pair = if config.use_semantic_similarity {
                embeddings.get(&a.id).zip(embeddings.get(&b.id))
            } else {
                None
            };

            let (combined, threshold, semantic_score) = match embedding_pair {
                Some((vec_a, vec_b)) => {
                    let semantic = cosine_similarity(vec_a, vec_b);
                    let weight = config.semantic_weight;
                    let combined = weight * semantic + (1.0 - weight) * keyword_score;
                    (combined, config.similarity_threshold, Some(semantic))
                }
                None => (keyword_score, config.keyword_overlap_threshold, None),
            };

            if combined < threshold {
                continue;
            }

            let mut metadata = HashMap::new();
            metadata.insert(
                "shared_keywords".to_string(),
                json!(shared_keywords(set_a, set_b)),
            );
            metadata.insert("combined_score".to_string(), json!(combined));
            if keyword_score > 0.0 {
                metadata.insert("keyword_score".to_string(), json!(keyword_score));
            }
            if let Some(semantic) = semantic_score {
                if semantic > 0.0 {
                    metadata.insert("semantic_score".to_string(), json!(semantic));
                }
            }
            push_bidirectional(&mut relations, a, b, combined, metadata);
        }
    }

    relations
}

fn keyword_profiles(objects: &[CanonicalObject]) -> HashMap<String, BTreeSet<String>> {
    objects
        .iter()
        .map(|object| (object.id.clone(), keyword_set(object)))
        .collect()
}

/// Similarity edges are symmetric claims; both directions carry identical
/// confidence and metadata.
fn push_bidirectional(
    relations: &mut Vec<Relation>,
    a: &CanonicalObject,
    b: &CanonicalObject,
    confidence: f64,
    metadata: HashMap<String, serde_json::Value>,
) {
    let created_at = a.created_at();
    relations.push(
        Relation::new(
            &a.id,
            &b.id,
            RelationType::SimilarTo,
            RelationSource::Computed,
            confidence,
        )
        .with_metadata(metadata.clone())
        .with_created_at(created_at),
    );
    relations.push(
        Relation::new(
            &b.id,
            &a.id,
            RelationType::SimilarTo,
            RelationSource::Computed,
            confidence,
        )
        .with_metadata(metadata)
        .with_created_at(created_at),
    );
}
