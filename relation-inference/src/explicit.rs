use chrono::{DateTime, Utc};
use common::storage::types::{
    canonical_object::CanonicalObject,
    relation::{Relation, RelationSource, RelationType},
};

/// One pass over the corpus, emitting the structural relations each object
/// declares. Dangling targets are tolerated; they become nodes when the
/// graph is built.
pub fn extract_explicit(objects: &[CanonicalObject]) -> Vec<Relation> {
    let mut relations = Vec::new();

    for object in objects {
        let created_at = object.created_at();

        if let Some(ticket) = object.relation_one("triggered_by_ticket") {
            relations.push(explicit(
                &object.id,
                ticket,
                RelationType::TriggeredBy,
                created_at,
            ));
        }
        if let Some(issue) = object.relation_one("resulted_in_issue") {
            relations.push(explicit(
                &object.id,
                issue,
                RelationType::ResultedIn,
                created_at,
            ));
        }
        if let Some(user) = object.actor_one("created_by") {
            relations.push(explicit(&object.id, user, RelationType::CreatedBy, created_at));
        }
        for user in object.actor_many("assignees") {
            relations.push(explicit(&object.id, user, RelationType::AssignedTo, created_at));
        }
        // Decisions and participation point from the user at the object:
        // these edges answer "who acted on what".
        if let Some(user) = object.actor_one("decided_by") {
            let decided_at = object
                .timestamp("decided_at")
                .or_else(|| object.timestamp("updated_at"))
                .or(created_at);
            relations.push(explicit(user, &object.id, RelationType::DecidedBy, decided_at));
        }
        for user in object.actor_many("participants") {
            relations.push(explicit(
                user,
                &object.id,
                RelationType::ParticipatedIn,
                created_at,
            ));
        }
        for target in object.relation_many("linked_prs") {
            relations.push(explicit(&object.id, target, RelationType::RelatedTo, created_at));
        }
        for target in object.relation_many("linked_issues") {
            relations.push(explicit(&object.id, target, RelationType::RelatedTo, created_at));
        }
        if let Some(parent) = object.relation_one("parent_id") {
            relations.push(explicit(&object.id, parent, RelationType::BelongsTo, created_at));
        }
    }

    relations
}

fn explicit(
    from_id: &str,
    to_id: &str,
    relation_type: RelationType,
    created_at: Option<DateTime<Utc>>,
) -> Relation {
    Relation::new(from_id, to_id, relation_type, RelationSource::Explicit, 1.0)
        .with_created_at(created_at)
}
