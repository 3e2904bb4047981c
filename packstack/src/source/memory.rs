//! In-memory content source.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{path_in_directory, ContentSource, PackKind, ResourceVisitor, StreamOpener};
use super::filter::FILTER_SECTION;
use crate::resource::{ResourceError, ResourceId};

/// A content source whose resources live in memory.
///
/// Useful for embedded defaults and for tests.
///
/// # Example
///
/// ```
/// use packstack::source::{ContentSource, MemorySource, PackKind};
/// use packstack::resource::ResourceId;
///
/// let source = MemorySource::builder("base")
///     .text(PackKind::ClientResources, "a:x", "1")
///     .block(Some("^a$"), Some("^y$"))
///     .build()
///     .unwrap();
///
/// let id = ResourceId::parse("a:x").unwrap();
/// assert!(source.resource(PackKind::ClientResources, &id).is_some());
/// assert!(source.metadata_section("filter").unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct MemorySource {
    id: String,
    resources: BTreeMap<(PackKind, ResourceId), Arc<[u8]>>,
    sections: Map<String, Value>,
    close_count: AtomicUsize,
}

impl MemorySource {
    /// Start building a source with the given identifier.
    pub fn builder(id: impl Into<String>) -> MemorySourceBuilder {
        MemorySourceBuilder {
            id: id.into(),
            resources: BTreeMap::new(),
            sections: Map::new(),
            blocks: Vec::new(),
            error: None,
        }
    }

    /// Wrap the source for use in a pack stack.
    pub fn into_shared(self) -> Arc<dyn ContentSource> {
        Arc::new(self)
    }

    /// Number of times [`ContentSource::close`] has been called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Number of resources held, across both pack kinds.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the source holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn opener(data: &Arc<[u8]>) -> StreamOpener {
        let data = Arc::clone(data);
        Arc::new(move || {
            let bytes: Vec<u8> = data.to_vec();
            Ok(Box::new(std::io::Cursor::new(bytes)) as Box<dyn Read + Send>)
        })
    }
}

impl ContentSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource(&self, kind: PackKind, id: &ResourceId) -> Option<StreamOpener> {
        self.resources
            .get(&(kind, id.clone()))
            .map(Self::opener)
    }

    fn list_resources(
        &self,
        kind: PackKind,
        namespace: &str,
        directory: &str,
        visitor: &mut ResourceVisitor<'_>,
    ) {
        for ((entry_kind, id), data) in &self.resources {
            if *entry_kind == kind
                && id.namespace() == namespace
                && path_in_directory(id.path(), directory)
            {
                visitor(id.clone(), Self::opener(data));
            }
        }
    }

    fn namespaces(&self, kind: PackKind) -> BTreeSet<String> {
        self.resources
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .map(|(_, id)| id.namespace().to_string())
            .collect()
    }

    fn metadata_section(&self, section: &str) -> Result<Option<Value>, ResourceError> {
        Ok(self.sections.get(section).cloned())
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builder for [`MemorySource`].
///
/// Invalid identifiers are reported by [`MemorySourceBuilder::build`].
pub struct MemorySourceBuilder {
    id: String,
    resources: BTreeMap<(PackKind, ResourceId), Arc<[u8]>>,
    sections: Map<String, Value>,
    blocks: Vec<Value>,
    error: Option<ResourceError>,
}

impl MemorySourceBuilder {
    /// Add a binary resource.
    pub fn bytes(mut self, kind: PackKind, id: &str, data: impl Into<Vec<u8>>) -> Self {
        match ResourceId::parse(id) {
            Ok(id) => {
                let data: Vec<u8> = data.into();
                self.resources.insert((kind, id), Arc::from(data));
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Add a text resource.
    pub fn text(self, kind: PackKind, id: &str, text: &str) -> Self {
        self.bytes(kind, id, text.as_bytes().to_vec())
    }

    /// Add sidecar metadata for `id` (stored as `<id>.meta`).
    pub fn metadata(self, kind: PackKind, id: &str, metadata: Value) -> Self {
        let sidecar = format!("{}{}", id, crate::resource::METADATA_SUFFIX);
        self.bytes(kind, &sidecar, metadata.to_string().into_bytes())
    }

    /// Set a pack-level metadata section.
    pub fn section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }

    /// Append a blocked pattern to the `"filter"` section.
    pub fn block(mut self, namespace: Option<&str>, path: Option<&str>) -> Self {
        let mut pattern = Map::new();
        if let Some(namespace) = namespace {
            pattern.insert("namespace".to_string(), Value::from(namespace));
        }
        if let Some(path) = path {
            pattern.insert("path".to_string(), Value::from(path));
        }
        self.blocks.push(Value::Object(pattern));
        self
    }

    /// Finish building.
    pub fn build(mut self) -> Result<MemorySource, ResourceError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if !self.blocks.is_empty() {
            self.sections
                .insert(FILTER_SECTION.to_string(), json!({ "block": self.blocks }));
        }
        Ok(MemorySource {
            id: self.id,
            resources: self.resources,
            sections: self.sections,
            close_count: AtomicUsize::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: PackKind = PackKind::ClientResources;

    fn id(text: &str) -> ResourceId {
        ResourceId::parse(text).unwrap()
    }

    #[test]
    fn test_resource_lookup_respects_kind() {
        let source = MemorySource::builder("m")
            .text(KIND, "a:x", "1")
            .build()
            .unwrap();

        assert!(source.resource(KIND, &id("a:x")).is_some());
        assert!(source.resource(PackKind::ServerData, &id("a:x")).is_none());
        assert!(source.resource(KIND, &id("a:missing")).is_none());
    }

    #[test]
    fn test_opener_yields_content() {
        let source = MemorySource::builder("m")
            .text(KIND, "a:x", "hello")
            .build()
            .unwrap();

        let opener = source.resource(KIND, &id("a:x")).unwrap();
        let mut text = String::new();
        opener().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_list_resources_in_directory() {
        let source = MemorySource::builder("m")
            .text(KIND, "a:textures/one", "1")
            .text(KIND, "a:textures/sub/two", "2")
            .text(KIND, "a:models/three", "3")
            .text(KIND, "b:textures/four", "4")
            .build()
            .unwrap();

        let mut seen = Vec::new();
        source.list_resources(KIND, "a", "textures", &mut |id, _| seen.push(id.to_string()));
        assert_eq!(seen, vec!["a:textures/one", "a:textures/sub/two"]);
    }

    #[test]
    fn test_namespaces() {
        let source = MemorySource::builder("m")
            .text(KIND, "a:x", "1")
            .text(KIND, "b:x", "1")
            .text(PackKind::ServerData, "c:x", "1")
            .build()
            .unwrap();

        let namespaces: Vec<_> = source.namespaces(KIND).into_iter().collect();
        assert_eq!(namespaces, vec!["a", "b"]);
    }

    #[test]
    fn test_metadata_sidecar_is_a_resource() {
        let source = MemorySource::builder("m")
            .text(KIND, "a:x", "1")
            .metadata(KIND, "a:x", json!({"animation": {}}))
            .build()
            .unwrap();

        assert!(source.resource(KIND, &id("a:x.meta")).is_some());
    }

    #[test]
    fn test_block_builds_filter_section() {
        let source = MemorySource::builder("m")
            .block(Some("a"), Some("y"))
            .build()
            .unwrap();

        let section = source.metadata_section(FILTER_SECTION).unwrap().unwrap();
        assert_eq!(section, json!({"block": [{"namespace": "a", "path": "y"}]}));
    }

    #[test]
    fn test_invalid_id_fails_build() {
        let result = MemorySource::builder("m").text(KIND, "A:x", "1").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_close_is_counted() {
        let source = MemorySource::builder("m").build().unwrap();
        source.close();
        assert_eq!(source.close_count(), 1);
    }
}
