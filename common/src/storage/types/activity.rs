use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Started,
    Completed,
    Failed,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Append-only audit record. Writing one must never fail a pipeline run;
/// callers swallow storage errors at warn level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub id: String,
    pub operation_type: String,
    pub operation_name: String,
    pub description: String,
    pub status: ActivityStatus,
    pub triggered_by: String,
    #[serde(default)]
    pub details_json: Option<Value>,
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        operation_type: impl Into<String>,
        operation_name: impl Into<String>,
        description: impl Into<String>,
        status: ActivityStatus,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation_type: operation_type.into(),
            operation_name: operation_name.into(),
            description: description.into(),
            status,
            triggered_by: triggered_by.into(),
            details_json: None,
            git_commit: None,
            experiment_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details_json = Some(details);
        self
    }

    pub fn with_experiment_id(mut self, experiment_id: Option<String>) -> Self {
        self.experiment_id = experiment_id;
        self
    }

    pub fn with_git_commit(mut self, git_commit: Option<String>) -> Self {
        self.git_commit = git_commit;
        self
    }
}
