//! Dependency types -- relationships between issues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::DependencyType;

/// Represents a relationship between issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,

    pub depends_on_id: String,

    /// Dependency type (serialised as "type" in JSON).
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    /// Type-specific edge data (JSON blob). Always valid JSON; normalized
    /// to `"{}"` by the restore/import layers when empty or malformed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,

    /// Groups conversation edges for efficient thread queries.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thread_id: String,
}

/// Counts for dependencies and dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCounts {
    /// Number of issues this issue depends on.
    pub dependency_count: i32,
    /// Number of issues that depend on this issue.
    pub dependent_count: i32,
}

/// Parses a `depends_on_id` of the form `external:<project>:<id>`.
///
/// Returns `None` if the string does not have the `external:` prefix or
/// does not split into exactly three colon-separated fields. Malformed
/// external references are skipped by callers, never rejected outright.
pub fn parse_external_ref(depends_on_id: &str) -> Option<(String, String)> {
    let rest = depends_on_id.strip_prefix("external:")?;
    let mut parts = rest.splitn(2, ':');
    let project = parts.next()?;
    let id = parts.next()?;
    if project.is_empty() || id.is_empty() {
        return None;
    }
    Some((project.to_owned(), id.to_owned()))
}

/// Returns `true` if `depends_on_id` refers to another database via the
/// `external:<project>:<id>` convention.
pub fn is_external_ref(depends_on_id: &str) -> bool {
    depends_on_id.starts_with("external:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_serde_roundtrip() {
        let dep = Dependency {
            issue_id: "bd-abc".into(),
            depends_on_id: "bd-def".into(),
            dep_type: DependencyType::Blocks,
            created_at: Utc::now(),
            created_by: "alice".into(),
            metadata: String::new(),
            thread_id: String::new(),
        };

        let json = serde_json::to_string(&dep).unwrap();
        assert!(json.contains(r#""type":"blocks""#));

        let back: Dependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dep_type, DependencyType::Blocks);
        assert_eq!(back.issue_id, "bd-abc");
    }

    #[test]
    fn parse_external_ref_ok() {
        let (project, id) = parse_external_ref("external:backend:bd-123").unwrap();
        assert_eq!(project, "backend");
        assert_eq!(id, "bd-123");
    }

    #[test]
    fn parse_external_ref_rejects_malformed() {
        assert!(parse_external_ref("bd-123").is_none());
        assert!(parse_external_ref("external:onlyproject").is_none());
        assert!(parse_external_ref("external::bd-1").is_none());
    }

    #[test]
    fn is_external_ref_detects_prefix() {
        assert!(is_external_ref("external:backend:bd-1"));
        assert!(!is_external_ref("bd-1"));
    }
}
