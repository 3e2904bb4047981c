//! Pack filter rules.
//!
//! A pack may declare resources it hides from every pack beneath it, even
//! when it does not supply a replacement:
//!
//! ```json
//! {
//!   "filter": {
//!     "block": [
//!       { "namespace": "legacy" },
//!       { "namespace": "ui", "path": "^textures/old/" }
//!     ]
//!   }
//! }
//! ```
//!
//! An omitted field matches everything. Patterns use search semantics, so
//! anchor them with `^`/`$` for whole-string matches.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use super::ContentSource;
use crate::resource::ResourceId;

/// Name of the pack metadata section holding filter rules.
pub const FILTER_SECTION: &str = "filter";

/// One blocked namespace/path pattern.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawBlockPattern")]
pub struct BlockPattern {
    namespace: Option<Regex>,
    path: Option<Regex>,
}

#[derive(Deserialize)]
struct RawBlockPattern {
    namespace: Option<String>,
    path: Option<String>,
}

impl TryFrom<RawBlockPattern> for BlockPattern {
    type Error = regex::Error;

    fn try_from(raw: RawBlockPattern) -> Result<Self, Self::Error> {
        BlockPattern::new(raw.namespace.as_deref(), raw.path.as_deref())
    }
}

impl BlockPattern {
    /// Compile a pattern; `None` matches everything.
    pub fn new(namespace: Option<&str>, path: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            namespace: namespace.map(Regex::new).transpose()?,
            path: path.map(Regex::new).transpose()?,
        })
    }

    /// Whether the namespace part matches `namespace`.
    pub fn matches_namespace(&self, namespace: &str) -> bool {
        self.namespace
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(namespace))
    }

    /// Whether the path part matches `path`.
    pub fn matches_path(&self, path: &str) -> bool {
        self.path
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(path))
    }

    /// Whether both parts match `id`.
    pub fn matches(&self, id: &ResourceId) -> bool {
        self.matches_namespace(id.namespace()) && self.matches_path(id.path())
    }
}

/// The parsed `"filter"` section of a pack.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSection {
    #[serde(default)]
    block: Vec<BlockPattern>,
}

impl FilterSection {
    /// Create a filter section from patterns.
    pub fn new(block: Vec<BlockPattern>) -> Self {
        Self { block }
    }

    /// Decode the section from raw JSON.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Read the filter section of `source`.
    ///
    /// A missing, unreadable or malformed section yields `None`; failures are
    /// logged and never abort resolution.
    pub fn from_source(source: &dyn ContentSource) -> Option<Self> {
        let raw = match source.metadata_section(FILTER_SECTION) {
            Ok(raw) => raw?,
            Err(e) => {
                error!(source = source.id(), error = %e, "Failed to read filter section");
                return None;
            }
        };

        match Self::from_value(raw) {
            Ok(section) => Some(section),
            Err(e) => {
                error!(source = source.id(), error = %e, "Failed to parse filter section");
                None
            }
        }
    }

    /// Whether any pattern blocks (part of) `namespace`.
    pub fn is_namespace_filtered(&self, namespace: &str) -> bool {
        self.block
            .iter()
            .any(|pattern| pattern.matches_namespace(namespace))
    }

    /// Whether any single pattern blocks `id`.
    pub fn is_filtered(&self, id: &ResourceId) -> bool {
        self.block.iter().any(|pattern| pattern.matches(id))
    }

    /// The blocked patterns.
    pub fn patterns(&self) -> &[BlockPattern] {
        &self.block
    }

    /// Whether the section blocks nothing.
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(text: &str) -> ResourceId {
        ResourceId::parse(text).unwrap()
    }

    #[test]
    fn test_parse_section() {
        let section = FilterSection::from_value(json!({
            "block": [{"namespace": "a", "path": "^y$"}, {"namespace": "legacy"}]
        }))
        .unwrap();

        assert_eq!(section.patterns().len(), 2);
        assert!(section.is_filtered(&id("a:y")));
        assert!(!section.is_filtered(&id("a:x")));
        assert!(section.is_filtered(&id("legacy:anything")));
    }

    #[test]
    fn test_missing_fields_match_everything() {
        let section = FilterSection::from_value(json!({"block": [{"path": "old/"}]})).unwrap();
        assert!(section.is_namespace_filtered("a"));
        assert!(section.is_namespace_filtered("b"));
        assert!(section.is_filtered(&id("b:textures/old/stone")));
        assert!(!section.is_filtered(&id("b:textures/new/stone")));
    }

    #[test]
    fn test_patterns_use_search_semantics() {
        let pattern = BlockPattern::new(Some("ui"), None).unwrap();
        assert!(pattern.matches_namespace("ui"));
        assert!(pattern.matches_namespace("legacy_ui"));
        assert!(!pattern.matches_namespace("core"));
    }

    #[test]
    fn test_pattern_must_match_namespace_and_path_together() {
        let section = FilterSection::new(vec![
            BlockPattern::new(Some("^a$"), Some("^x$")).unwrap(),
            BlockPattern::new(Some("^b$"), Some("^y$")).unwrap(),
        ]);
        assert!(section.is_filtered(&id("a:x")));
        assert!(section.is_filtered(&id("b:y")));
        assert!(!section.is_filtered(&id("a:y")));
    }

    #[test]
    fn test_invalid_regex_is_parse_error() {
        let result = FilterSection::from_value(json!({"block": [{"namespace": "("}]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_section() {
        let section = FilterSection::from_value(json!({})).unwrap();
        assert!(section.is_empty());
        assert!(!section.is_namespace_filtered("a"));
    }
}
