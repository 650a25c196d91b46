use std::collections::HashMap;

use serde_json::json;

use common::storage::types::{
    canonical_object::CanonicalObject,
    relation::{Relation, RelationSource, RelationType},
};

/// Group objects by `semantic_hash` and point every later copy at the
/// first one seen. Objects without a hash never participate.
pub fn detect_duplicates(objects: &[CanonicalObject]) -> Vec<Relation> {
    let mut groups: HashMap<&str, Vec<&CanonicalObject>> = HashMap::new();
    let mut hash_order: Vec<&str> = Vec::new();

    for object in objects {
        if let Some(hash) = object.semantic_hash.as_deref() {
            let group = groups.entry(hash).or_default();
            if group.is_empty() {
                hash_order.push(hash);
            }
            group.push(object);
        }
    }

    let mut relations = Vec::new();
    for hash in hash_order {
        let Some(group) = groups.get(hash) else {
            continue;
        };
        if group.len() < 2 {
            continue;
        }

        let original = group[0];
        let group_size = group.len();
        for duplicate in group.iter().skip(1) {
            let mut relation = Relation::new(
                &duplicate.id,
                &original.id,
                RelationType::DuplicateOf,
                RelationSource::Computed,
                1.0,
            )
            .with_created_at(duplicate.created_at());
            relation.metadata.insert("semantic_hash".to_string(), json!(hash));
            relation
                .metadata
                .insert("detection_method".to_string(), json!("semantic_hash"));
            relation
                .metadata
                .insert("group_size".to_string(), json!(group_size));
            relations.push(relation);
        }
    }

    relations
}
