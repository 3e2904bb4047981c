//! Overlays layered over a primary source.
//!
//! A composite occupies a single slot in the pack stack. Its overlays are
//! searched from last to first, then the primary; pack-level metadata always
//! comes from the primary.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use super::{ContentSource, PackKind, ResourceVisitor, StreamOpener};
use crate::resource::{ResourceError, ResourceId};

/// A primary source with overlays sharing its priority slot.
pub struct CompositeSource {
    primary: Arc<dyn ContentSource>,
    overlays: Vec<Arc<dyn ContentSource>>,
}

impl CompositeSource {
    /// Create a composite; later overlays win over earlier ones.
    pub fn new(primary: Arc<dyn ContentSource>, overlays: Vec<Arc<dyn ContentSource>>) -> Self {
        Self { primary, overlays }
    }

    /// The primary source.
    pub fn primary(&self) -> &Arc<dyn ContentSource> {
        &self.primary
    }

    /// Sources in search order: highest overlay first, primary last.
    fn search_order(&self) -> impl Iterator<Item = &Arc<dyn ContentSource>> {
        self.overlays
            .iter()
            .rev()
            .chain(std::iter::once(&self.primary))
    }
}

impl ContentSource for CompositeSource {
    fn id(&self) -> &str {
        self.primary.id()
    }

    fn resource(&self, kind: PackKind, id: &ResourceId) -> Option<StreamOpener> {
        self.search_order()
            .find_map(|source| source.resource(kind, id))
    }

    fn list_resources(
        &self,
        kind: PackKind,
        namespace: &str,
        directory: &str,
        visitor: &mut ResourceVisitor<'_>,
    ) {
        // Primary first so that overlays overwrite it.
        let mut merged = BTreeMap::new();
        for source in std::iter::once(&self.primary).chain(self.overlays.iter()) {
            source.list_resources(kind, namespace, directory, &mut |id, opener| {
                merged.insert(id, opener);
            });
        }
        for (id, opener) in merged {
            visitor(id, opener);
        }
    }

    fn namespaces(&self, kind: PackKind) -> BTreeSet<String> {
        self.search_order()
            .flat_map(|source| source.namespaces(kind))
            .collect()
    }

    fn metadata_section(&self, section: &str) -> Result<Option<Value>, ResourceError> {
        self.primary.metadata_section(section)
    }

    fn close(&self) {
        for source in self.search_order() {
            source.close();
        }
    }
}
