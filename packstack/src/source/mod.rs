//! Content sources ("packs").
//!
//! A [`ContentSource`] is an opaque provider of bytes by identifier,
//! namespace listings and pack-level metadata sections. The resolvers only
//! talk to this capability interface; concrete backends are never inspected
//! by type.
//!
//! # Backends
//!
//! - [`MemorySource`]: resources held in memory
//! - [`PathSource`]: a pack directory on disk
//! - [`CompositeSource`]: a primary source with overlays sharing its slot
//!
//! # Filter Rules
//!
//! A source may carry a [`FilterSection`] in its `"filter"` metadata section,
//! describing resources it hides from every source beneath it.

mod composite;
mod filter;
mod memory;
mod path;

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{ResourceError, ResourceId};

pub use composite::CompositeSource;
pub use filter::{BlockPattern, FilterSection, FILTER_SECTION};
pub use memory::{MemorySource, MemorySourceBuilder};
pub use path::{PathSource, PACK_METADATA_FILE};

/// Opens the byte stream of one resource.
///
/// Calling the opener performs the actual I/O; holding one is free.
pub type StreamOpener = Arc<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Callback receiving each `(id, opener)` pair of a listing.
pub type ResourceVisitor<'a> = dyn FnMut(ResourceId, StreamOpener) + 'a;

/// Which half of a pack is being resolved.
///
/// Packs keep client-side resources and server-side data in separate roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackKind {
    /// Client resources, stored under `assets/`.
    ClientResources,
    /// Server data, stored under `data/`.
    ServerData,
}

impl PackKind {
    /// The root directory of this kind inside a pack.
    pub fn directory(&self) -> &'static str {
        match self {
            PackKind::ClientResources => "assets",
            PackKind::ServerData => "data",
        }
    }
}

impl fmt::Display for PackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackKind::ClientResources => write!(f, "client resources"),
            PackKind::ServerData => write!(f, "server data"),
        }
    }
}

impl FromStr for PackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "assets" | "client" | "resources" => Ok(PackKind::ClientResources),
            "data" | "server" => Ok(PackKind::ServerData),
            other => Err(format!(
                "unknown pack kind '{}' (expected 'assets' or 'data')",
                other
            )),
        }
    }
}

/// One ranked provider of resources.
///
/// Sources are owned by the caller and outlive a single reload. Their
/// position in the stack handed to the resolvers decides priority; the
/// source itself has no notion of rank.
pub trait ContentSource: Send + Sync {
    /// Stable identifier, used for logging and filter diagnostics.
    fn id(&self) -> &str;

    /// Look up one resource.
    ///
    /// Returns an opener without reading any bytes.
    fn resource(&self, kind: PackKind, id: &ResourceId) -> Option<StreamOpener>;

    /// Visit every resource of `namespace` under `directory`.
    ///
    /// `directory` is namespace-relative and has no trailing slash; the
    /// empty string lists the whole namespace. Sidecar `.meta` resources are
    /// visited like any other resource.
    fn list_resources(
        &self,
        kind: PackKind,
        namespace: &str,
        directory: &str,
        visitor: &mut ResourceVisitor<'_>,
    );

    /// Namespaces this source populates.
    fn namespaces(&self, kind: PackKind) -> BTreeSet<String>;

    /// Raw JSON of a pack-level metadata section.
    ///
    /// `Ok(None)` when the source has no such section.
    fn metadata_section(&self, section: &str) -> Result<Option<Value>, ResourceError>;

    /// Release any handles held by the source.
    fn close(&self) {}
}

impl fmt::Debug for dyn ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSource")
            .field("id", &self.id())
            .finish()
    }
}

/// Whether `path` lies in `directory` (namespace-relative, no trailing slash).
pub(crate) fn path_in_directory(path: &str, directory: &str) -> bool {
    directory.is_empty()
        || path
            .strip_prefix(directory)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_kind_directory() {
        assert_eq!(PackKind::ClientResources.directory(), "assets");
        assert_eq!(PackKind::ServerData.directory(), "data");
    }

    #[test]
    fn test_pack_kind_from_str() {
        assert_eq!("assets".parse::<PackKind>(), Ok(PackKind::ClientResources));
        assert_eq!("DATA".parse::<PackKind>(), Ok(PackKind::ServerData));
        assert!("textures".parse::<PackKind>().is_err());
    }

    #[test]
    fn test_path_in_directory() {
        assert!(path_in_directory("textures/a.png", "textures"));
        assert!(path_in_directory("textures/sub/a.png", "textures"));
        assert!(path_in_directory("anything", ""));
        assert!(!path_in_directory("textures_extra/a.png", "textures"));
        assert!(!path_in_directory("textures", "textures"));
    }
}
