use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use common::storage::types::ground_truth::{GroundTruthRelation, EXCLUDED_GROUND_TRUTH_TYPES};
use common::storage::types::relation::{pair_key, Relation};

/// Relation-inference quality against the curated corpus.
///
/// Matching is undirected and type-agnostic: an edge counts once per
/// unordered ID pair no matter which direction or label either side chose.
/// The raw relation counts are reported alongside so reviewers can see how
/// much bidirectional emission collapsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub false_negatives: usize,
    pub ground_truth_total: usize,
    pub inferred_total: usize,
}

pub fn evaluate_validation(
    inferred: &[Relation],
    ground_truth: &[GroundTruthRelation],
) -> ValidationReport {
    let inferred_pairs: BTreeSet<(String, String)> =
        inferred.iter().map(Relation::pair_key).collect();

    let usable_ground_truth: Vec<&GroundTruthRelation> = ground_truth
        .iter()
        .filter(|relation| {
            !EXCLUDED_GROUND_TRUTH_TYPES
                .iter()
                .any(|excluded| *excluded == relation.relation_type)
        })
        .collect();

    let ground_truth_pairs: BTreeSet<(String, String)> = usable_ground_truth
        .iter()
        .map(|relation| pair_key(&relation.from_id, &relation.to_id))
        .collect();

    let tp = inferred_pairs.intersection(&ground_truth_pairs).count();
    let fp = inferred_pairs.difference(&ground_truth_pairs).count();
    let false_negatives = ground_truth_pairs.difference(&inferred_pairs).count();

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ValidationReport {
        f1,
        precision,
        recall,
        tp,
        fp,
        false_negatives,
        ground_truth_total: usable_ground_truth.len(),
        inferred_total: inferred.len(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
