use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A field that platforms populate with either a single reference or an
/// ordered list of them (`actors.assignees`, `relations.linked_prs`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value.as_str()),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::One(value) => Box::new(std::iter::once(value.as_str())),
            Self::Many(values) => Box::new(values.iter().map(String::as_str)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    #[default]
    Team,
    Public,
}

/// Optional pre-computed summary block carried by some sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Uniform record shape for every ingested artifact, regardless of the
/// platform it came from. The `id` follows the
/// `platform|workspace|object_type|platform_id` grammar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalObject {
    pub id: String,
    pub platform: String,
    pub object_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub actors: HashMap<String, OneOrMany>,
    #[serde(default)]
    pub timestamps: HashMap<String, Option<String>>,
    #[serde(default)]
    pub relations: HashMap<String, OneOrMany>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub semantic_hash: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl CanonicalObject {
    /// Minimal well-formed object; callers fill in the optional maps.
    pub fn new(id: impl Into<String>, platform: impl Into<String>, object_type: impl Into<String>) -> Self {
        let mut timestamps = HashMap::new();
        timestamps.insert(
            "created_at".to_string(),
            Some(Utc::now().to_rfc3339()),
        );
        Self {
            id: id.into(),
            platform: platform.into(),
            object_type: object_type.into(),
            title: None,
            body: None,
            actors: HashMap::new(),
            timestamps,
            relations: HashMap::new(),
            properties: HashMap::new(),
            summary: None,
            semantic_hash: None,
            visibility: Visibility::default(),
        }
    }

    /// Title and body joined for chunking; empty when the object carries
    /// neither.
    pub fn combined_text(&self) -> String {
        let title = self.title.as_deref().unwrap_or_default().trim();
        let body = self.body.as_deref().unwrap_or_default().trim();
        match (title.is_empty(), body.is_empty()) {
            (true, true) => String::new(),
            (false, true) => title.to_owned(),
            (true, false) => body.to_owned(),
            (false, false) => format!("{title}\n\n{body}"),
        }
    }

    /// Parse a named timestamp. Malformed values are a data warning, not a
    /// failure: they read as absent.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.timestamps.get(name)?.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                warn!(
                    object_id = %self.id,
                    timestamp = name,
                    value = raw,
                    error = %err,
                    "malformed timestamp on canonical object"
                );
                None
            }
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created_at")
    }

    pub fn actor_one(&self, role: &str) -> Option<&str> {
        self.actors.get(role).and_then(OneOrMany::first)
    }

    pub fn actor_many(&self, role: &str) -> Vec<&str> {
        self.actors
            .get(role)
            .map(|value| value.iter().collect())
            .unwrap_or_default()
    }

    pub fn relation_one(&self, key: &str) -> Option<&str> {
        self.relations.get(key).and_then(OneOrMany::first)
    }

    pub fn relation_many(&self, key: &str) -> Vec<&str> {
        self.relations
            .get(key)
            .map(|value| value.iter().collect())
            .unwrap_or_default()
    }

    /// A `properties` entry holding a list of strings; scalars and
    /// non-string members are skipped.
    pub fn string_list_property(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.string_list_property("keywords")
    }

    pub fn labels(&self) -> Vec<String> {
        self.string_list_property("labels")
    }
}
