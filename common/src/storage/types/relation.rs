use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of relation types the graph understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    TriggeredBy,
    ResultedIn,
    BelongsTo,
    AssignedTo,
    CreatedBy,
    DecidedBy,
    ParticipatedIn,
    SimilarTo,
    DuplicateOf,
    RelatedTo,
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TriggeredBy => "triggered_by",
            Self::ResultedIn => "resulted_in",
            Self::BelongsTo => "belongs_to",
            Self::AssignedTo => "assigned_to",
            Self::CreatedBy => "created_by",
            Self::DecidedBy => "decided_by",
            Self::ParticipatedIn => "participated_in",
            Self::SimilarTo => "similar_to",
            Self::DuplicateOf => "duplicate_of",
            Self::RelatedTo => "related_to",
        };
        f.write_str(label)
    }
}

/// Where an edge came from: a structural field, a deterministic algorithm,
/// or an LLM judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationSource {
    Explicit,
    Inferred,
    Computed,
}

impl fmt::Display for RelationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
            Self::Computed => "computed",
        };
        f.write_str(label)
    }
}

/// Typed, weighted directed edge between two canonical objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub source: RelationSource,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Relation {
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        relation_type: RelationType,
        source: RelationSource,
        confidence: f64,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            relation_type,
            source,
            confidence,
            metadata: HashMap::new(),
            created_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Undirected, type-agnostic identity used for evaluation set
    /// membership: the ID pair in lexicographic order.
    pub fn pair_key(&self) -> (String, String) {
        pair_key(&self.from_id, &self.to_id)
    }
}

/// Normalize an edge to `(min, max)` so that `(a,b)` and `(b,a)` compare
/// equal regardless of type.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}
