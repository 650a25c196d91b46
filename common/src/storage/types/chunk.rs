use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkMethod {
    #[serde(rename = "fixed-size")]
    FixedSize,
    #[serde(rename = "semantic")]
    Semantic,
    #[serde(rename = "relational")]
    Relational,
    #[serde(rename = "full_text")]
    FullText,
}

impl fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FixedSize => "fixed-size",
            Self::Semantic => "semantic",
            Self::Relational => "relational",
            Self::FullText => "full_text",
        };
        f.write_str(label)
    }
}

/// One retrievable text fragment of a canonical object. Chunks are owned by
/// their object: re-chunking an object replaces all of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub canonical_object_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub method: ChunkMethod,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(
        canonical_object_id: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
        method: ChunkMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            canonical_object_id: canonical_object_id.into(),
            chunk_index,
            content: content.into(),
            method,
            metadata: HashMap::new(),
            embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new("slack|w|thread|T1", 0, "hello world", ChunkMethod::FixedSize);
        assert_eq!(chunk.canonical_object_id, "slack|w|thread|T1");
        assert_eq!(chunk.chunk_index, 0);
        assert_eq!(chunk.content, "hello world");
        assert!(chunk.embedding.is_none());
        assert!(!chunk.id.is_empty());
    }

    #[test]
    fn test_method_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChunkMethod::FixedSize).expect("serialize"),
            "\"fixed-size\""
        );
        assert_eq!(
            serde_json::to_string(&ChunkMethod::FullText).expect("serialize"),
            "\"full_text\""
        );
        let parsed: ChunkMethod =
            serde_json::from_str("\"relational\"").expect("deserialize");
        assert_eq!(parsed, ChunkMethod::Relational);
    }
}
