//! Artifact data model: tracked files, side-car metadata, and link aliases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkout::RECORDS_DIR;

/// Side-car metadata file suffix; the record sits next to its artifact.
pub const META_SUFFIX: &str = ".meta.json";

/// Extension of link (alias) artifacts
pub const LINK_EXT: &str = "link";

/// Side-car metadata record, mutated only together with its artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    #[serde(default)]
    pub description: String,

    /// MAJOR.MINOR revision string
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Author of the latest check-in
    #[serde(default)]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_revision() -> String {
    "0.0".to_string()
}

impl Default for ArtifactMeta {
    fn default() -> Self {
        Self {
            description: String::new(),
            revision: default_revision(),
            author: String::new(),
            created_at: None,
        }
    }
}

/// Body of a `.link` artifact: a named alias for a master artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTarget {
    /// Working-copy path of the master artifact
    pub master: String,
}

/// A tracked artifact as reported to dashboards and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub is_pointer: bool,
    pub is_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,
}

/// Side-car metadata path for an artifact path.
pub fn meta_path(rel_path: &str) -> String {
    format!("{rel_path}{META_SUFFIX}")
}

/// Whether a tracked path is registry/metadata plumbing rather than an
/// artifact.
pub fn is_internal(rel_path: &str) -> bool {
    rel_path.starts_with(&format!("{RECORDS_DIR}/"))
        || rel_path.ends_with(META_SUFFIX)
        || matches!(rel_path, ".gitattributes" | ".gitignore")
}

/// Whether the path is a link artifact.
pub fn is_link(rel_path: &str) -> bool {
    std::path::Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(LINK_EXT))
        .unwrap_or(false)
}

/// Main group identifier: first 2 digits of a 7-digit part number stem.
pub fn group_of(stem: &str) -> Option<String> {
    let digits: &str = stem.get(..7)?;
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(format!("{}XXXXX", &digits[..2]))
    } else {
        None
    }
}

/// Subgroup identifier: the full 7-digit part number.
pub fn subgroup_of(stem: &str) -> Option<String> {
    let digits = stem.get(..7)?;
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_path_is_sidecar() {
        assert_eq!(meta_path("1234567.mcam"), "1234567.mcam.meta.json");
        assert_eq!(
            meta_path("parts/1234567_AB123.vnc"),
            "parts/1234567_AB123.vnc.meta.json"
        );
    }

    #[test]
    fn internal_paths_are_recognized() {
        assert!(is_internal(".locks/1234567_mcam.lock"));
        assert!(is_internal("1234567.mcam.meta.json"));
        assert!(is_internal(".gitattributes"));
        assert!(!is_internal("1234567.mcam"));
        assert!(!is_internal("1234567.link"));
    }

    #[test]
    fn link_detection() {
        assert!(is_link("1234567_ABC123.link"));
        assert!(!is_link("1234567.mcam"));
    }

    #[test]
    fn grouping_from_stem() {
        assert_eq!(group_of("1234567"), Some("12XXXXX".to_string()));
        assert_eq!(subgroup_of("1234567_AB123"), Some("1234567".to_string()));
        assert_eq!(group_of("short"), None);
        assert_eq!(group_of("abcdefg"), None);
    }

    #[test]
    fn meta_defaults() {
        let meta: ArtifactMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.revision, "0.0");
        assert!(meta.description.is_empty());
    }
}
