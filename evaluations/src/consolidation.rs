use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use common::storage::types::{canonical_object::CanonicalObject, relation::Relation};

/// Token-Jaccard cutoff for calling two objects near-duplicates.
const DUPLICATE_SIMILARITY_THRESHOLD: f64 = 0.8;

/// At most this many candidate pairs appear in the report.
const TOP_DUPLICATES_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCandidate {
    pub first_id: String,
    pub second_id: String,
    pub similarity: f64,
}

/// Where the corpus could be consolidated: near-duplicate objects and
/// relations stated more than once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsolidationReport {
    pub duplicate_pairs: usize,
    pub duplicate_clusters: usize,
    pub redundant_relations: usize,
    pub avg_similarity: f64,
    pub top_duplicates: Vec<DuplicateCandidate>,
    /// `(duplicate_pairs + redundant_relations) / objects`.
    pub consolidation_ratio: f64,
}

pub fn evaluate_consolidation(
    objects: &[CanonicalObject],
    relations: &[Relation],
) -> ConsolidationReport {
    if objects.is_empty() {
        return ConsolidationReport::default();
    }

    let token_sets: Vec<BTreeSet<String>> = objects.iter().map(object_tokens).collect();

    let mut candidates: Vec<DuplicateCandidate> = Vec::new();
    let mut union_find = UnionFind::new(objects.len());

    for i in 0..objects.len() {
        for j in (i + 1)..objects.len() {
            let (Some(set_a), Some(set_b)) = (token_sets.get(i), token_sets.get(j)) else {
                continue;
            };
            if set_a.is_empty() || set_b.is_empty() {
                continue;
            }
            let similarity = token_jaccard(set_a, set_b);
            if similarity >= DUPLICATE_SIMILARITY_THRESHOLD {
                candidates.push(DuplicateCandidate {
                    first_id: objects[i].id.clone(),
                    second_id: objects[j].id.clone(),
                    similarity,
                });
                union_find.union(i, j);
            }
        }
    }

    let duplicate_pairs = candidates.len();
    let duplicate_clusters = union_find.cluster_count();
    let redundant_relations = count_redundant_relations(relations);

    #[allow(clippy::cast_precision_loss)]
    let avg_similarity = if candidates.is_empty() {
        0.0
    } else {
        candidates.iter().map(|c| c.similarity).sum::<f64>() / candidates.len() as f64
    };

    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.first_id.cmp(&b.first_id))
    });
    candidates.truncate(TOP_DUPLICATES_LIMIT);

    #[allow(clippy::cast_precision_loss)]
    let consolidation_ratio =
        (duplicate_pairs + redundant_relations) as f64 / objects.len() as f64;

    ConsolidationReport {
        duplicate_pairs,
        duplicate_clusters,
        redundant_relations,
        avg_similarity,
        top_duplicates: candidates,
        consolidation_ratio,
    }
}

/// Same `(from, to, type)` triple stated more than once; each extra
/// statement counts as one redundancy.
pub fn count_redundant_relations(relations: &[Relation]) -> usize {
    let mut counts: HashMap<(String, String, String), usize> = HashMap::new();
    for relation in relations {
        *counts
            .entry((
                relation.from_id.clone(),
                relation.to_id.clone(),
                relation.relation_type.to_string(),
            ))
            .or_default() += 1;
    }
    counts.values().filter(|count| **count > 1).map(|count| count - 1).sum()
}

fn object_tokens(object: &CanonicalObject) -> BTreeSet<String> {
    let mut text = object.combined_text();
    if let Some(summary) = &object.summary {
        if let Some(short) = &summary.short {
            text.push(' ');
            text.push_str(short);
        }
        for keyword in &summary.keywords {
            text.push(' ');
            text.push_str(keyword);
        }
    }

    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn token_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        a.intersection(b).count() as f64 / union as f64
    }
}

struct UnionFind {
    parent: Vec<usize>,
    in_cluster: Vec<bool>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            in_cluster: vec![false; size],
        }
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = index;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        self.in_cluster[a] = true;
        self.in_cluster[b] = true;
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b] = root_a;
        }
    }

    /// Distinct roots among members that joined at least one pair.
    fn cluster_count(&mut self) -> usize {
        let mut roots = BTreeSet::new();
        for index in 0..self.parent.len() {
            if self.in_cluster[index] {
                let root = self.find(index);
                roots.insert(root);
            }
        }
        roots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::relation::{RelationSource, RelationType};

    fn object_with_body(id: &str, body: &str) -> CanonicalObject {
        let mut object = CanonicalObject::new(id, "slack", "thread");
        object.body = Some(body.to_string());
        object
    }

    #[test]
    fn test_zero_objects_all_zero_metrics() {
        let report = evaluate_consolidation(&[], &[]);
        assert_eq!(report, ConsolidationReport::default());
    }

    #[test]
    fn test_near_duplicates_detected_and_clustered() {
        let objects = vec![
            object_with_body("a|w|t|1", "payment gateway timeout during checkout flow"),
            object_with_body("a|w|t|2", "payment gateway timeout during checkout flow"),
            object_with_body("a|w|t|3", "payment gateway timeout during checkout flow today"),
            object_with_body("a|w|t|4", "unrelated quarterly planning document"),
        ];

        let report = evaluate_consolidation(&objects, &[]);

        // 1↔2 identical, 1↔3 and 2↔3 share 6 of 7 tokens (≈0.857).
        assert_eq!(report.duplicate_pairs, 3);
        assert_eq!(report.duplicate_clusters, 1);
        assert!(report.avg_similarity > 0.85);
        assert_eq!(report.top_duplicates.len(), 3);
        assert!((report.top_duplicates[0].similarity - 1.0).abs() < 1e-12);
        assert!((report.consolidation_ratio - 3.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_separate_clusters() {
        let objects = vec![
            object_with_body("a|w|t|1", "alpha beta gamma delta epsilon"),
            object_with_body("a|w|t|2", "alpha beta gamma delta epsilon"),
            object_with_body("a|w|t|3", "zeta eta theta iota kappa"),
            object_with_body("a|w|t|4", "zeta eta theta iota kappa"),
        ];
        let report = evaluate_consolidation(&objects, &[]);
        assert_eq!(report.duplicate_pairs, 2);
        assert_eq!(report.duplicate_clusters, 2);
    }

    #[test]
    fn test_summary_tokens_participate() {
        let mut first = object_with_body("a|w|t|1", "short note");
        first.summary = Some(common::storage::types::canonical_object::Summary {
            short: Some("billing outage retro".to_string()),
            keywords: vec!["billing".to_string()],
            ..Default::default()
        });
        let mut second = object_with_body("a|w|t|2", "short note");
        second.summary = Some(common::storage::types::canonical_object::Summary {
            short: Some("billing outage retro".to_string()),
            keywords: vec!["billing".to_string()],
            ..Default::default()
        });

        let report = evaluate_consolidation(&[first, second], &[]);
        assert_eq!(report.duplicate_pairs, 1);
    }

    #[test]
    fn test_redundant_relations_counted_per_extra_statement() {
        let relations = vec![
            Relation::new("a", "b", RelationType::RelatedTo, RelationSource::Explicit, 1.0),
            Relation::new("a", "b", RelationType::RelatedTo, RelationSource::Explicit, 1.0),
            Relation::new("a", "b", RelationType::RelatedTo, RelationSource::Explicit, 1.0),
            // Different type: not redundant with the above.
            Relation::new("a", "b", RelationType::SimilarTo, RelationSource::Computed, 0.9),
            // Different direction: a distinct triple.
            Relation::new("b", "a", RelationType::RelatedTo, RelationSource::Explicit, 1.0),
        ];
        assert_eq!(count_redundant_relations(&relations), 2);
    }

    #[test]
    fn test_empty_bodies_never_match() {
        let objects = vec![
            object_with_body("a|w|t|1", ""),
            object_with_body("a|w|t|2", ""),
        ];
        let report = evaluate_consolidation(&objects, &[]);
        assert_eq!(report.duplicate_pairs, 0);
        assert_eq!(report.consolidation_ratio, 0.0);
    }
}
