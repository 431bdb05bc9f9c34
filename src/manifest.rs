//! Output records produced by a parse
//!
//! Field order on the serialized records is contractual: consumers diff
//! JSON output across runs, so `selfName`/`selfVersion` come first and a
//! declaration serializes `name`, `platforms`, `versions` before the
//! optional fields. Development and trailing-conditional declarations
//! never carry a `groups` key.

use serde::{Deserialize, Serialize};

/// One recognized dependency declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemDeclaration {
    /// Package name after quote stripping.
    pub name: String,
    /// Effective platform labels (outer `platforms` blocks plus inline pairs).
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Normalized version constraints in source order.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Effective group labels; absent on development and conditional declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    /// Git/GitHub source hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    /// Local path source hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Load flag from a `require:` pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require: Option<bool>,
}

impl GemDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        GemDeclaration {
            name: name.into(),
            platforms: Vec::new(),
            versions: Vec::new(),
            groups: None,
            git: None,
            path: None,
            require: None,
        }
    }
}

/// Runtime and development dependencies, each in source order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DependencyGroups {
    #[serde(default)]
    pub runtime: Vec<GemDeclaration>,
    #[serde(default)]
    pub development: Vec<GemDeclaration>,
}

/// The complete record extracted from one manifest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParseOutput {
    /// The package's own name, when a spec constructor declares one.
    #[serde(rename = "selfName", default, skip_serializing_if = "Option::is_none")]
    pub self_name: Option<String>,
    /// The package's own version, when a spec constructor declares one.
    #[serde(rename = "selfVersion", default, skip_serializing_if = "Option::is_none")]
    pub self_version: Option<String>,
    pub groups: DependencyGroups,
}

impl ParseOutput {
    /// Total number of declarations across both buckets.
    pub fn len(&self) -> usize {
        self.groups.runtime.len() + self.groups.development.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output_serializes_both_buckets() {
        let out = ParseOutput::default();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("selfName").is_none());
        assert_eq!(json["groups"]["runtime"], serde_json::json!([]));
        assert_eq!(json["groups"]["development"], serde_json::json!([]));
    }

    #[test]
    fn test_declaration_omits_absent_optionals() {
        let decl = GemDeclaration::new("rails");
        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(json["name"], "rails");
        assert_eq!(json["platforms"], serde_json::json!([]));
        assert_eq!(json["versions"], serde_json::json!([]));
        assert!(json.get("groups").is_none());
        assert!(json.get("git").is_none());
        assert!(json.get("path").is_none());
        assert!(json.get("require").is_none());
    }

    #[test]
    fn test_empty_groups_still_serialize() {
        let mut decl = GemDeclaration::new("rails");
        decl.groups = Some(Vec::new());
        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(json["groups"], serde_json::json!([]));
    }

    #[test]
    fn test_roundtrip() {
        let mut decl = GemDeclaration::new("pg");
        decl.versions = vec!["~> 1.4".to_string()];
        decl.require = Some(false);
        let mut out = ParseOutput::default();
        out.self_name = Some("app".to_string());
        out.groups.runtime.push(decl);
        let json = serde_json::to_string(&out).unwrap();
        let back: ParseOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }
}
