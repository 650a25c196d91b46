use std::fmt;

use crate::error::AppError;

const SEGMENT_SEPARATOR: char = '|';

/// Parsed form of a canonical object id: `platform|workspace|object_type|platform_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalId {
    pub platform: String,
    pub workspace: String,
    pub object_type: String,
    pub platform_id: String,
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.platform, self.workspace, self.object_type, self.platform_id
        )
    }
}

/// `platform` and `object_type` match `[a-z_][a-z0-9_]*`.
fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains(SEGMENT_SEPARATOR)
}

pub fn generate_canonical_id(
    platform: &str,
    workspace: &str,
    object_type: &str,
    platform_id: &str,
) -> Result<String, AppError> {
    let id = CanonicalId {
        platform: platform.to_owned(),
        workspace: workspace.to_owned(),
        object_type: object_type.to_owned(),
        platform_id: platform_id.to_owned(),
    };
    validate_canonical_id(&id)?;
    Ok(id.to_string())
}

pub fn parse_canonical_id(id: &str) -> Result<CanonicalId, AppError> {
    let segments: Vec<&str> = id.split(SEGMENT_SEPARATOR).collect();
    let [platform, workspace, object_type, platform_id] = segments.as_slice() else {
        return Err(AppError::Validation(format!(
            "canonical id must have exactly 4 pipe-separated segments: {id}"
        )));
    };

    let parsed = CanonicalId {
        platform: (*platform).to_owned(),
        workspace: (*workspace).to_owned(),
        object_type: (*object_type).to_owned(),
        platform_id: (*platform_id).to_owned(),
    };
    validate_canonical_id(&parsed)?;
    Ok(parsed)
}

fn validate_canonical_id(id: &CanonicalId) -> Result<(), AppError> {
    if !is_identifier(&id.platform) {
        return Err(AppError::Validation(format!(
            "invalid platform segment: {}",
            id.platform
        )));
    }
    if !is_identifier(&id.object_type) {
        return Err(AppError::Validation(format!(
            "invalid object_type segment: {}",
            id.object_type
        )));
    }
    if !is_segment(&id.workspace) {
        return Err(AppError::Validation(format!(
            "invalid workspace segment: {}",
            id.workspace
        )));
    }
    if !is_segment(&id.platform_id) {
        return Err(AppError::Validation(format!(
            "invalid platform_id segment: {}",
            id.platform_id
        )));
    }
    Ok(())
}

/// Check well-formedness without allocating the parsed form.
pub fn is_well_formed_id(id: &str) -> bool {
    parse_canonical_id(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_parse_round_trips() {
        let id = generate_canonical_id("slack", "acme", "thread", "T-1042").expect("generate id");
        assert_eq!(id, "slack|acme|thread|T-1042");

        let parsed = parse_canonical_id(&id).expect("parse id");
        assert_eq!(parsed.platform, "slack");
        assert_eq!(parsed.workspace, "acme");
        assert_eq!(parsed.object_type, "thread");
        assert_eq!(parsed.platform_id, "T-1042");
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        assert!(parse_canonical_id("slack|acme|thread").is_err());
        assert!(parse_canonical_id("slack|acme|thread|T1|extra").is_err());
        assert!(parse_canonical_id("").is_err());
    }

    #[test]
    fn test_platform_and_type_follow_identifier_grammar() {
        assert!(generate_canonical_id("Slack", "w", "thread", "1").is_err());
        assert!(generate_canonical_id("slack", "w", "9thread", "1").is_err());
        assert!(generate_canonical_id("_internal", "w", "audit_log", "1").is_ok());
    }

    #[test]
    fn test_workspace_and_platform_id_reject_pipes_and_empty() {
        assert!(generate_canonical_id("slack", "", "thread", "1").is_err());
        assert!(generate_canonical_id("slack", "a|b", "thread", "1").is_err());
        assert!(generate_canonical_id("slack", "w", "thread", "").is_err());
        assert!(generate_canonical_id("slack", "w", "thread", "id with spaces").is_ok());
    }

    #[test]
    fn test_user_references_share_the_grammar() {
        assert!(is_well_formed_id("user|acme|user|U123"));
        assert!(!is_well_formed_id("user|acme|user"));
    }
}
