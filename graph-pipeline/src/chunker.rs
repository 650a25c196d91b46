use serde::{Deserialize, Serialize};
use serde_json::json;
use text_splitter::{ChunkConfig, TextSplitter};

use common::error::AppError;
use common::storage::types::canonical_object::CanonicalObject;
use common::storage::types::chunk::{Chunk, ChunkMethod};
use common::utils::config::{ChunkStrategy, ChunkingConfig};

/// Aggregate chunk statistics; sizes are in characters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub avg_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub total_chunk_size: usize,
}

/// Splits one canonical object into an ordered chunk sequence. Indices are
/// contiguous from 0 per object; an object with no text yields no chunks.
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, AppError> {
        if config.max_chunk_size == 0 {
            return Err(AppError::Config("maxChunkSize must be positive".into()));
        }
        if config.overlap >= config.max_chunk_size {
            return Err(AppError::Config(format!(
                "overlap ({}) must be smaller than maxChunkSize ({})",
                config.overlap, config.max_chunk_size
            )));
        }
        Ok(Self { config })
    }

    pub fn chunk_object(&self, object: &CanonicalObject) -> Vec<Chunk> {
        let text = object.combined_text();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let (contents, method) = match self.config.strategy {
            ChunkStrategy::FixedSize => (self.fixed_size_split(&text), ChunkMethod::FixedSize),
            ChunkStrategy::Semantic => (self.semantic_split(&text), ChunkMethod::Semantic),
            ChunkStrategy::Relational => (relational_split(&text), ChunkMethod::Relational),
        };

        let total = contents.len();
        contents
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let mut chunk = Chunk::new(&object.id, index, content, method);
                if self.config.preserve_metadata {
                    chunk
                        .metadata
                        .insert("object_id".to_string(), json!(object.id));
                    chunk
                        .metadata
                        .insert("object_type".to_string(), json!(object.object_type));
                    chunk
                        .metadata
                        .insert("platform".to_string(), json!(object.platform));
                    chunk
                        .metadata
                        .insert("title".to_string(), json!(object.title));
                    chunk
                        .metadata
                        .insert("chunk_of_total".to_string(), json!(total));
                }
                chunk
            })
            .collect()
    }

    pub fn chunk_objects(&self, objects: &[CanonicalObject]) -> Vec<Chunk> {
        objects
            .iter()
            .flat_map(|object| self.chunk_object(object))
            .collect()
    }

    /// Strict character windows; adjacent windows share `overlap` chars.
    fn fixed_size_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let size = self.config.max_chunk_size;
        if chars.len() <= size {
            return vec![text.to_owned()];
        }

        // overlap < size is checked at construction, so step ≥ 1
        let step = size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let end = (start + size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Paragraph/sentence-boundary splitting within the size cap.
    fn semantic_split(&self, text: &str) -> Vec<String> {
        let chunk_config = match ChunkConfig::new(self.config.max_chunk_size)
            .with_overlap(self.config.overlap)
        {
            Ok(config) => config,
            Err(err) => {
                // Construction already validated overlap < max; only an
                // upstream library change could land here.
                tracing::warn!(error = %err, "semantic chunk config rejected; using full text");
                return vec![text.to_owned()];
            }
        };
        let splitter = TextSplitter::new(chunk_config);
        let chunks: Vec<String> = splitter.chunks(text).map(str::to_owned).collect();
        if chunks.is_empty() {
            vec![text.to_owned()]
        } else {
            chunks
        }
    }

    pub fn stats(chunks: &[Chunk]) -> ChunkingStats {
        if chunks.is_empty() {
            return ChunkingStats::default();
        }

        let sizes: Vec<usize> = chunks
            .iter()
            .map(|chunk| chunk.content.chars().count())
            .collect();
        let total_chunk_size: usize = sizes.iter().sum();

        #[allow(clippy::cast_precision_loss)]
        ChunkingStats {
            total_chunks: chunks.len(),
            avg_chunk_size: total_chunk_size as f64 / chunks.len() as f64,
            min_chunk_size: sizes.iter().min().copied().unwrap_or(0),
            max_chunk_size: sizes.iter().max().copied().unwrap_or(0),
            total_chunk_size,
        }
    }
}

/// One chunk per logical sub-unit. Canonical form joins thread messages
/// and issue comments with blank lines, so blank-line segments are the
/// sub-units; a long sub-unit stays whole.
fn relational_split(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: ChunkStrategy, max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            strategy,
            max_chunk_size: max,
            overlap,
            preserve_metadata: true,
        }
    }

    fn object_with_body(id: &str, body: &str) -> CanonicalObject {
        let mut object = CanonicalObject::new(id, "slack", "thread");
        object.body = Some(body.to_string());
        object
    }

    #[test]
    fn test_invalid_overlap_is_config_error() {
        assert!(matches!(
            Chunker::new(config(ChunkStrategy::FixedSize, 100, 100)),
            Err(AppError::Config(_))
        ));
        assert!(Chunker::new(config(ChunkStrategy::FixedSize, 0, 0)).is_err());
        assert!(Chunker::new(config(ChunkStrategy::FixedSize, 100, 99)).is_ok());
    }

    #[test]
    fn test_empty_object_yields_no_chunks() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 100, 10)).expect("chunker");
        let object = CanonicalObject::new("slack|w|thread|T1", "slack", "thread");
        assert!(chunker.chunk_object(&object).is_empty());
    }

    #[test]
    fn test_fixed_size_windows_share_overlap() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 10, 4)).expect("chunker");
        let object = object_with_body("slack|w|thread|T1", "abcdefghijklmnopqrstuvwxyz");

        let chunks = chunker.chunk_object(&object);

        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "ghijklmnop");
        // Adjacent windows share the last 4 chars of the previous one.
        assert!(chunks[0].content.ends_with("ghij"));
        assert!(chunks[1].content.starts_with("ghij"));
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, index);
            assert!(chunk.content.chars().count() <= 10);
        }
    }

    #[test]
    fn test_fixed_size_short_text_single_chunk() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 100, 10)).expect("chunker");
        let object = object_with_body("slack|w|thread|T1", "short body");
        let chunks = chunker.chunk_object(&object);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "short body");
    }

    #[test]
    fn test_chunk_indices_contiguous_from_zero() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 8, 2)).expect("chunker");
        let object = object_with_body("slack|w|thread|T1", &"x".repeat(100));
        let chunks = chunker.chunk_object(&object);
        assert!(chunks.len() > 1);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, index);
        }
    }

    #[test]
    fn test_metadata_preserved_with_totals() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 10, 2)).expect("chunker");
        let mut object = object_with_body("slack|w|thread|T1", "abcdefghijklmnopqrstuvwxyz");
        object.title = None;
        let chunks = chunker.chunk_object(&object);
        let total = chunks.len();

        for chunk in &chunks {
            assert_eq!(chunk.metadata.get("object_id"), Some(&json!("slack|w|thread|T1")));
            assert_eq!(chunk.metadata.get("object_type"), Some(&json!("thread")));
            assert_eq!(chunk.metadata.get("platform"), Some(&json!("slack")));
            assert_eq!(chunk.metadata.get("title"), Some(&json!(null)));
            assert_eq!(chunk.metadata.get("chunk_of_total"), Some(&json!(total)));
        }
    }

    #[test]
    fn test_metadata_omitted_when_disabled() {
        let mut cfg = config(ChunkStrategy::FixedSize, 100, 10);
        cfg.preserve_metadata = false;
        let chunker = Chunker::new(cfg).expect("chunker");
        let chunks = chunker.chunk_object(&object_with_body("slack|w|thread|T1", "body"));
        assert!(chunks[0].metadata.is_empty());
    }

    #[test]
    fn test_relational_splits_on_blank_lines() {
        let chunker = Chunker::new(config(ChunkStrategy::Relational, 100, 10)).expect("chunker");
        let object = object_with_body(
            "slack|w|thread|T1",
            "first message\n\nsecond message\n\n\n\nthird message",
        );
        let chunks = chunker.chunk_object(&object);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "first message");
        assert_eq!(chunks[1].content, "second message");
        assert_eq!(chunks[2].content, "third message");
        assert!(chunks.iter().all(|c| c.method == ChunkMethod::Relational));
    }

    #[test]
    fn test_semantic_respects_size_cap() {
        let chunker = Chunker::new(config(ChunkStrategy::Semantic, 40, 0)).expect("chunker");
        let body = "First sentence here. Second sentence follows. Third one closes the thought.";
        let chunks = chunker.chunk_object(&object_with_body("slack|w|thread|T1", body));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 40);
            assert_eq!(chunk.method, ChunkMethod::Semantic);
        }
    }

    #[test]
    fn test_chunk_objects_flattens_in_order() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 100, 10)).expect("chunker");
        let objects = vec![
            object_with_body("a|w|t|1", "first object"),
            CanonicalObject::new("a|w|t|2", "a", "t"),
            object_with_body("a|w|t|3", "third object"),
        ];
        let chunks = chunker.chunk_objects(&objects);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].canonical_object_id, "a|w|t|1");
        assert_eq!(chunks[1].canonical_object_id, "a|w|t|3");
    }

    #[test]
    fn test_stats() {
        let chunker = Chunker::new(config(ChunkStrategy::FixedSize, 10, 0)).expect("chunker");
        let chunks = chunker.chunk_object(&object_with_body("a|w|t|1", &"y".repeat(25)));
        let stats = Chunker::stats(&chunks);

        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.total_chunk_size, 25);
        assert_eq!(stats.min_chunk_size, 5);
        assert_eq!(stats.max_chunk_size, 10);
        assert!((stats.avg_chunk_size - 25.0 / 3.0).abs() < 1e-12);

        assert_eq!(Chunker::stats(&[]), ChunkingStats::default());
    }
}
