use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::storage::types::relation::{Relation, RelationType};

/// Which endpoint of an edge to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    From,
    To,
    Both,
}

/// Linear filter: relations touching `id` on the requested side.
pub fn relations_for<'a>(
    relations: &'a [Relation],
    id: &str,
    direction: Direction,
) -> Vec<&'a Relation> {
    relations
        .iter()
        .filter(|relation| match direction {
            Direction::From => relation.from_id == id,
            Direction::To => relation.to_id == id,
            Direction::Both => relation.from_id == id || relation.to_id == id,
        })
        .collect()
}

pub fn relations_by_type<'a>(
    relations: &'a [Relation],
    relation_type: RelationType,
) -> Vec<&'a Relation> {
    relations
        .iter()
        .filter(|relation| relation.relation_type == relation_type)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelationStats {
    pub total: usize,
    pub by_type: HashMap<String, usize>,
    pub by_source: HashMap<String, usize>,
    pub avg_confidence: f64,
}

pub fn relation_stats(relations: &[Relation]) -> RelationStats {
    let mut by_type: HashMap<String, usize> = HashMap::new();
    let mut by_source: HashMap<String, usize> = HashMap::new();
    let mut confidence_sum = 0.0f64;

    for relation in relations {
        *by_type.entry(relation.relation_type.to_string()).or_default() += 1;
        *by_source.entry(relation.source.to_string()).or_default() += 1;
        confidence_sum += relation.confidence;
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_confidence = if relations.is_empty() {
        0.0
    } else {
        confidence_sum / relations.len() as f64
    };

    RelationStats {
        total: relations.len(),
        by_type,
        by_source,
        avg_confidence,
    }
}
