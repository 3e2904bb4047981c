//! Error types for resource resolution and access.

use std::io;

use thiserror::Error;

use super::id::ResourceId;

/// Errors that can occur while reading resources.
///
/// Lookups never fail with "not found": an absent resource or namespace is
/// an empty `Option` or collection. [`ResourceError::NotFound`] is only
/// produced by convenience helpers that open a resource by identifier.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No source supplies the resource (or it was blocked by a filter).
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    /// Opening or reading the resource's bytes failed.
    #[error("I/O error reading {id}: {source}")]
    Io {
        id: ResourceId,
        #[source]
        source: io::Error,
    },

    /// The sidecar metadata (or a pack metadata section) is malformed.
    #[error("Invalid metadata for {id}: {source}")]
    Metadata {
        id: ResourceId,
        #[source]
        source: serde_json::Error,
    },

    /// A pack-level metadata section could not be read.
    #[error("Failed to read metadata section '{section}' of source '{source_id}': {reason}")]
    Section {
        source_id: String,
        section: String,
        reason: String,
    },

    /// The text is not a valid resource identifier.
    #[error("Invalid resource id '{0}': {1}")]
    InvalidId(String, &'static str),

    /// Listing directories must not end with a slash.
    #[error("Trailing slash in directory '{0}'")]
    TrailingSlash(String),
}

impl ResourceError {
    /// Wrap an I/O error with the identifier being read.
    pub fn io(id: &ResourceId, source: io::Error) -> Self {
        Self::Io {
            id: id.clone(),
            source,
        }
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
