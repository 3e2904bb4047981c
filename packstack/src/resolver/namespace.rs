//! Resolution of one namespace across the pack stack.
//!
//! # Overview
//!
//! A [`NamespaceResolver`] holds an ordered list of entries, lowest priority
//! first. An entry either supplies content (a [`ContentSource`], optionally
//! with a filter) or only masks content (a filter-only entry).
//!
//! ```text
//!   top ──► [ addon    | filter: a:y ]   supplies a:x
//!           [ blocker  | filter: a:z ]   filter-only
//!   bottom► [ base     |             ]   supplies a:x, a:y, a:z
//! ```
//!
//! Lookups scan from the top. An entry whose filter matches an identifier
//! it does not supply ends the scan: lower entries are never consulted.
//!
//! Content and sidecar metadata (`<path>.meta`) are resolved as two
//! independent override chains; a filter over a content id does not
//! necessarily match its metadata id.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{trace, warn};

use super::manager::{check_directory, ListFilter, ResourceManager};
use crate::resource::{
    metadata_from_stream, no_metadata, MetadataOpener, Resource, ResourceError, ResourceId,
    ResourceMetadata,
};
use crate::source::{ContentSource, PackKind, StreamOpener};

/// Predicate over identifiers hidden by an entry.
pub type IdFilter = Arc<dyn Fn(&ResourceId) -> bool + Send + Sync>;

#[derive(Clone)]
struct StackEntry {
    name: String,
    source: Option<Arc<dyn ContentSource>>,
    filter: Option<IdFilter>,
}

impl StackEntry {
    fn is_filtered(&self, id: &ResourceId) -> bool {
        self.filter.as_ref().is_some_and(|filter| filter(id))
    }

    /// Remove everything this entry hides from a working set.
    fn filter_all<V>(&self, found: &mut HashMap<ResourceId, V>) {
        if let Some(filter) = &self.filter {
            found.retain(|id, _| !filter(id));
        }
    }
}

/// A candidate found during a listing, tagged with its entry index.
struct Candidate {
    source: Arc<dyn ContentSource>,
    opener: StreamOpener,
    index: usize,
}

/// All layers found for one content id during a stack listing.
#[derive(Default)]
struct CandidateStack {
    content: Vec<Candidate>,
    metadata: HashMap<usize, StreamOpener>,
}

/// Resolves the resources of one namespace across an ordered entry list.
pub struct NamespaceResolver {
    kind: PackKind,
    namespace: String,
    entries: Vec<StackEntry>,
}

impl NamespaceResolver {
    /// Create an empty resolver for `namespace`.
    pub fn new(kind: PackKind, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            entries: Vec::new(),
        }
    }

    /// The namespace served.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of entries, including filter-only ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been pushed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a content entry with higher priority than all before it.
    pub fn push(&mut self, source: Arc<dyn ContentSource>, filter: Option<IdFilter>) {
        self.entries.push(StackEntry {
            name: source.id().to_string(),
            source: Some(source),
            filter,
        });
    }

    /// Append an entry that only masks resources.
    pub fn push_filter_only(&mut self, name: impl Into<String>, filter: IdFilter) {
        self.entries.push(StackEntry {
            name: name.into(),
            source: None,
            filter: Some(filter),
        });
    }

    fn serves(&self, id: &ResourceId) -> bool {
        id.namespace() == self.namespace
    }

    /// Metadata opener scanning from the top of the stack down to `index`.
    fn stack_metadata(&self, id: &ResourceId, index: usize) -> MetadataOpener {
        let kind = self.kind;
        let metadata_id = id.metadata_id();
        let entries: Vec<StackEntry> = self.entries[index..].to_vec();

        Arc::new(move || {
            for entry in entries.iter().rev() {
                if let Some(source) = &entry.source {
                    if let Some(opener) = source.resource(kind, &metadata_id) {
                        return metadata_from_stream(metadata_id.clone(), opener)();
                    }
                }
                if entry.is_filtered(&metadata_id) {
                    break;
                }
            }
            Ok(ResourceMetadata::empty())
        })
    }

    /// Metadata opener reading the sidecar of `source` only.
    fn source_metadata(&self, id: &ResourceId, source: &Arc<dyn ContentSource>) -> MetadataOpener {
        let kind = self.kind;
        let metadata_id = id.metadata_id();
        let source = Arc::clone(source);

        Arc::new(move || match source.resource(kind, &metadata_id) {
            Some(opener) => metadata_from_stream(metadata_id.clone(), opener)(),
            None => Ok(ResourceMetadata::empty()),
        })
    }

    /// The highest-priority resource for `id`.
    ///
    /// Returns `None` when no entry supplies `id`, or when an entry above
    /// every supplier blocks it.
    pub fn resolve(&self, id: &ResourceId) -> Option<Resource> {
        if !self.serves(id) {
            return None;
        }

        for (index, entry) in self.entries.iter().enumerate().rev() {
            if let Some(source) = &entry.source {
                if let Some(opener) = source.resource(self.kind, id) {
                    let metadata = self.stack_metadata(id, index);
                    return Some(Resource::new(
                        id.clone(),
                        Arc::clone(source),
                        opener,
                        metadata,
                    ));
                }
            }

            if entry.is_filtered(id) {
                warn!(id = %id, source = %entry.name, "Resource not found, but was filtered by pack");
                return None;
            }
        }

        trace!(id = %id, "Resource not found");
        None
    }

    /// Every layer supplying `id`, lowest priority first.
    ///
    /// Collection stops at the first filter matching `id`. The topmost layer
    /// carries the same metadata [`resolve`](Self::resolve) would attach to
    /// it; lower layers carry their own sidecar unless an entry above them
    /// filters the metadata id.
    pub fn resolve_stack(&self, id: &ResourceId) -> Vec<Resource> {
        if !self.serves(id) {
            return Vec::new();
        }

        let metadata_id = id.metadata_id();
        let mut stack = Vec::new();
        let mut metadata_filtered = false;
        let mut blocked_by = None;

        for (index, entry) in self.entries.iter().enumerate().rev() {
            if let Some(source) = &entry.source {
                if let Some(opener) = source.resource(self.kind, id) {
                    let metadata = if stack.is_empty() {
                        self.stack_metadata(id, index)
                    } else if metadata_filtered {
                        no_metadata()
                    } else {
                        self.source_metadata(id, source)
                    };
                    stack.push(Resource::new(
                        id.clone(),
                        Arc::clone(source),
                        opener,
                        metadata,
                    ));
                }
            }

            if entry.is_filtered(id) {
                blocked_by = Some(entry.name.as_str());
                break;
            }

            if entry.is_filtered(&metadata_id) {
                metadata_filtered = true;
            }
        }

        if stack.is_empty() {
            if let Some(name) = blocked_by {
                warn!(id = %id, source = %name, "Resource not found, but was filtered by pack");
            }
        }

        stack.reverse();
        stack
    }

    /// All resources under `directory` accepted by `filter`.
    ///
    /// Entries are processed lowest priority first. Each entry's filter is
    /// applied to everything found so far before the entry adds its own
    /// candidates, so higher entries overwrite lower ones.
    pub fn list_all(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Resource>, ResourceError> {
        check_directory(directory)?;

        let mut content: HashMap<ResourceId, Candidate> = HashMap::new();
        let mut metadata: HashMap<ResourceId, Candidate> = HashMap::new();

        for (index, entry) in self.entries.iter().enumerate() {
            entry.filter_all(&mut content);
            entry.filter_all(&mut metadata);

            let Some(source) = &entry.source else {
                continue;
            };
            source.list_resources(self.kind, &self.namespace, directory, &mut |id, opener| {
                let candidate = Candidate {
                    source: Arc::clone(source),
                    opener,
                    index,
                };
                if id.is_metadata() {
                    let content_id = id.from_metadata_id();
                    if content_id.as_ref().is_some_and(|content_id| filter(content_id)) {
                        metadata.insert(id, candidate);
                    }
                } else if filter(&id) {
                    content.insert(id, candidate);
                }
            });
        }

        let mut result = BTreeMap::new();
        for (id, candidate) in content {
            let metadata_id = id.metadata_id();
            let metadata_opener = match metadata.get(&metadata_id) {
                Some(meta) if meta.index >= candidate.index => {
                    metadata_from_stream(metadata_id, Arc::clone(&meta.opener))
                }
                _ => no_metadata(),
            };
            let resource = Resource::new(id.clone(), candidate.source, candidate.opener, metadata_opener);
            result.insert(id, resource);
        }
        Ok(result)
    }

    /// Every layer of each resource under `directory` accepted by `filter`.
    ///
    /// A filter matching a content id drops all layers found so far for it;
    /// a filter matching only its metadata id drops the sidecars found so
    /// far. Each layer carries the sidecar of its own entry.
    pub fn list_all_stacks(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Vec<Resource>>, ResourceError> {
        check_directory(directory)?;

        let mut stacks: HashMap<ResourceId, CandidateStack> = HashMap::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.filter.is_some() {
                for (id, stack) in stacks.iter_mut() {
                    if entry.is_filtered(id) {
                        stack.content.clear();
                    } else if entry.is_filtered(&id.metadata_id()) {
                        stack.metadata.clear();
                    }
                }
            }

            let Some(source) = &entry.source else {
                continue;
            };
            source.list_resources(self.kind, &self.namespace, directory, &mut |id, opener| {
                if id.is_metadata() {
                    if let Some(content_id) = id.from_metadata_id() {
                        if filter(&content_id) {
                            stacks.entry(content_id).or_default().metadata.insert(index, opener);
                        }
                    }
                } else if filter(&id) {
                    stacks.entry(id).or_default().content.push(Candidate {
                        source: Arc::clone(source),
                        opener,
                        index,
                    });
                }
            });
        }

        let mut result = BTreeMap::new();
        for (id, stack) in stacks {
            if stack.content.is_empty() {
                continue;
            }
            let metadata_id = id.metadata_id();
            let layers = stack
                .content
                .into_iter()
                .map(|candidate| {
                    let metadata_opener = match stack.metadata.get(&candidate.index) {
                        Some(opener) => metadata_from_stream(metadata_id.clone(), Arc::clone(opener)),
                        None => no_metadata(),
                    };
                    Resource::new(id.clone(), candidate.source, candidate.opener, metadata_opener)
                })
                .collect();
            result.insert(id, layers);
        }
        Ok(result)
    }
}

impl ResourceManager for NamespaceResolver {
    fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.resolve(id)
    }

    fn resource_stack(&self, id: &ResourceId) -> Vec<Resource> {
        self.resolve_stack(id)
    }

    fn list_resources(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Resource>, ResourceError> {
        self.list_all(directory, filter)
    }

    fn list_resource_stacks(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Vec<Resource>>, ResourceError> {
        self.list_all_stacks(directory, filter)
    }

    fn namespaces(&self) -> BTreeSet<String> {
        BTreeSet::from([self.namespace.clone()])
    }

    fn list_sources(&self) -> Vec<Arc<dyn ContentSource>> {
        self.entries
            .iter()
            .filter_map(|entry| entry.source.clone())
            .collect()
    }
}

impl std::fmt::Debug for NamespaceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.source.is_some(), entry.filter.is_some()))
            .collect();
        f.debug_struct("NamespaceResolver")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("entries", &entries)
            .finish()
    }
}
