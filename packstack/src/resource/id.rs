//! Resource identifiers.
//!
//! A [`ResourceId`] is a `namespace:path` pair. Namespaces group the
//! resources of one pack or plugin; paths are `/`-separated and relative to
//! the namespace root.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ResourceError;

/// Namespace used when an identifier is written without one.
pub const DEFAULT_NAMESPACE: &str = "base";

/// Separator between namespace and path in the textual form.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Suffix appended to a resource path to locate its sidecar metadata.
pub const METADATA_SUFFIX: &str = ".meta";

/// A namespaced resource identifier.
///
/// Two identifiers are equal iff namespace and path match exactly.
/// Ordering compares the path first and the namespace second, so listings
/// that span namespaces keep related paths adjacent.
///
/// # Example
///
/// ```
/// use packstack::resource::ResourceId;
///
/// let id = ResourceId::parse("ui:textures/button.png").unwrap();
/// assert_eq!(id.namespace(), "ui");
/// assert_eq!(id.path(), "textures/button.png");
/// assert_eq!(id.to_string(), "ui:textures/button.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    namespace: String,
    path: String,
}

impl ResourceId {
    /// Create an identifier, validating both parts.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self, ResourceError> {
        let namespace = namespace.into();
        let path = path.into();

        if namespace.is_empty() {
            return Err(ResourceError::InvalidId(
                format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, path),
                "empty namespace",
            ));
        }
        if !namespace.chars().all(is_valid_namespace_char) {
            return Err(ResourceError::InvalidId(
                format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, path),
                "namespace contains characters outside [a-z0-9_.-]",
            ));
        }
        if !path.chars().all(is_valid_path_char) {
            return Err(ResourceError::InvalidId(
                format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, path),
                "path contains characters outside [a-z0-9/._-]",
            ));
        }

        Ok(Self { namespace, path })
    }

    /// Create an identifier in the [`DEFAULT_NAMESPACE`].
    pub fn with_default_namespace(path: impl Into<String>) -> Result<Self, ResourceError> {
        Self::new(DEFAULT_NAMESPACE, path)
    }

    /// Parse `namespace:path`, or a bare `path` in the default namespace.
    pub fn parse(text: &str) -> Result<Self, ResourceError> {
        match text.split_once(NAMESPACE_SEPARATOR) {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::with_default_namespace(text),
        }
    }

    /// The namespace part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The path part.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A sibling identifier in the same namespace with a different path.
    pub fn with_path(&self, path: impl Into<String>) -> Result<Self, ResourceError> {
        Self::new(self.namespace.clone(), path)
    }

    /// The identifier of this resource's sidecar metadata (`<path>.meta`).
    pub fn metadata_id(&self) -> Self {
        // Suffix characters are all valid path characters.
        Self {
            namespace: self.namespace.clone(),
            path: format!("{}{}", self.path, METADATA_SUFFIX),
        }
    }

    /// Whether this identifier names a sidecar metadata resource.
    pub fn is_metadata(&self) -> bool {
        self.path.ends_with(METADATA_SUFFIX)
    }

    /// The content identifier a sidecar metadata identifier belongs to.
    ///
    /// Returns `None` if this is not a metadata identifier.
    pub fn from_metadata_id(&self) -> Option<Self> {
        self.path
            .strip_suffix(METADATA_SUFFIX)
            .map(|content_path| Self {
                namespace: self.namespace.clone(),
                path: content_path.to_string(),
            })
    }
}

/// Valid namespace characters: `[a-z0-9_.-]`.
pub fn is_valid_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

/// Valid path characters: `[a-z0-9/._-]`.
pub fn is_valid_path_char(c: char) -> bool {
    is_valid_namespace_char(c) || c == '/'
}

/// Whether `namespace` is a valid namespace name.
pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.chars().all(is_valid_namespace_char)
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.namespace.cmp(&other.namespace))
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.path)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
