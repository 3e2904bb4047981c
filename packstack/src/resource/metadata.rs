//! Sidecar metadata attached to resources.
//!
//! A resource `ns:path` may have a sidecar `ns:path.meta` holding a JSON
//! object. Each top-level key is a named section that consumers decode with
//! serde.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::ResourceError;
use super::id::ResourceId;

/// Parsed sidecar metadata for one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMetadata {
    sections: Map<String, Value>,
}

impl ResourceMetadata {
    /// Metadata with no sections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a sidecar from a reader.
    ///
    /// The document must be a JSON object; `id` names the sidecar for error
    /// reporting.
    pub fn from_reader(id: &ResourceId, reader: impl Read) -> Result<Self, ResourceError> {
        let sections: Map<String, Value> =
            serde_json::from_reader(reader).map_err(|source| ResourceError::Metadata {
                id: id.clone(),
                source,
            })?;
        Ok(Self { sections })
    }

    /// Build metadata from already-parsed sections.
    pub fn from_sections(sections: Map<String, Value>) -> Self {
        Self { sections }
    }

    /// Decode a named section.
    ///
    /// Returns `Ok(None)` when the section is absent.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, serde_json::Error> {
        self.sections
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// The raw JSON of a named section.
    pub fn raw_section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Names of all sections present.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Whether no sections are present.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
