use serde::{Deserialize, Serialize};

/// Curated relation used as evaluation reference. `relation_type` is an
/// open string here: the curated corpus also carries reviewer verdicts
/// (`human_verified_unrelated`, `human_uncertain`) that are filtered out
/// before scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruthRelation {
    pub from_id: String,
    pub to_id: String,
    pub relation_type: String,
    pub source: String,
    pub confidence: f64,
    pub scenario: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedResult {
    pub canonical_object_id: String,
    pub relevance_score: f64,
}

/// Curated retrieval query with graded expected results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruthQuery {
    pub id: String,
    pub query_text: String,
    pub scenario: String,
    #[serde(default)]
    pub expected_results: Vec<ExpectedResult>,
}

/// Ground-truth relation types excluded from validation comparisons.
pub const EXCLUDED_GROUND_TRUTH_TYPES: [&str; 2] =
    ["human_verified_unrelated", "human_uncertain"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_truth_relation_deserializes() {
        let relation: GroundTruthRelation = serde_json::from_str(
            r#"{
                "from_id": "slack|w|thread|T1",
                "to_id": "zendesk|w|ticket|Z1",
                "relation_type": "related_to",
                "source": "human",
                "confidence": 1.0,
                "scenario": "normal"
            }"#,
        )
        .expect("deserialize ground truth relation");
        assert_eq!(relation.scenario, "normal");
        assert_eq!(relation.relation_type, "related_to");
    }

    #[test]
    fn test_query_expected_results_default_empty() {
        let query: GroundTruthQuery = serde_json::from_str(
            r#"{"id": "q1", "query_text": "rate limits", "scenario": "normal"}"#,
        )
        .expect("deserialize query");
        assert!(query.expected_results.is_empty());
    }
}
