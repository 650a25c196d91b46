use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Upsert payload for an experiment row; unique on `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewExperiment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config_json: Value,
    #[serde(default)]
    pub is_baseline: bool,
    #[serde(default)]
    pub paper_ids: Vec<String>,
    #[serde(default)]
    pub git_commit: Option<String>,
    pub status: ExperimentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub config_json: Value,
    pub is_baseline: bool,
    pub paper_ids: Vec<String>,
    pub git_commit: Option<String>,
    pub status: ExperimentStatus,
    pub created_at: DateTime<Utc>,
    pub run_completed_at: Option<DateTime<Utc>>,
}

/// Per-scenario validation outcome; unique on `(experiment_id, scenario)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub scenario: String,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub false_negatives: usize,
    pub ground_truth_total: usize,
    pub inferred_total: usize,
    #[serde(default)]
    pub retrieval_time_ms: Option<f64>,
}

/// Pipeline layers that report metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Chunking,
    Embedding,
    Validation,
    Retrieval,
    Graph,
    Temporal,
    Consolidation,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Validation => "validation",
            Self::Retrieval => "retrieval",
            Self::Graph => "graph",
            Self::Temporal => "temporal",
            Self::Consolidation => "consolidation",
        };
        f.write_str(label)
    }
}

/// Per-layer metric record; unique on
/// `(experiment_id, layer, evaluation_method)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerMetricsRecord {
    pub experiment_id: String,
    pub layer: Layer,
    pub evaluation_method: String,
    pub metrics_json: Value,
    pub duration_ms: u64,
}
