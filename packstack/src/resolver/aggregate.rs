//! Resolution across every namespace of a pack stack.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::manager::{check_directory, ListFilter, ResourceManager};
use super::namespace::{IdFilter, NamespaceResolver};
use crate::resource::{Resource, ResourceError, ResourceId};
use crate::source::{ContentSource, FilterSection, PackKind};

/// One [`NamespaceResolver`] per namespace exposed by the pack stack.
///
/// Built once per reload and never mutated afterwards; a reload replaces
/// the whole resolver.
///
/// # Example
///
/// ```
/// use packstack::resolver::{AggregateResolver, ResourceManager};
/// use packstack::resource::ResourceId;
/// use packstack::source::{MemorySource, PackKind};
///
/// let kind = PackKind::ClientResources;
/// let base = MemorySource::builder("base")
///     .text(kind, "a:x", "1")
///     .text(kind, "a:y", "2")
///     .build()
///     .unwrap();
/// let addon = MemorySource::builder("addon")
///     .text(kind, "a:x", "override")
///     .block(Some("^a$"), Some("^y$"))
///     .build()
///     .unwrap();
///
/// let resolver = AggregateResolver::new(kind, vec![base.into_shared(), addon.into_shared()]);
/// let x = ResourceId::parse("a:x").unwrap();
/// let y = ResourceId::parse("a:y").unwrap();
/// assert_eq!(resolver.read_to_string(&x).unwrap(), "override");
/// assert!(resolver.resource(&y).is_none());
/// ```
pub struct AggregateResolver {
    kind: PackKind,
    sources: Vec<Arc<dyn ContentSource>>,
    namespaces: HashMap<String, NamespaceResolver>,
    closed: AtomicBool,
}

impl AggregateResolver {
    /// A resolver with no sources.
    pub fn empty(kind: PackKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Build a resolver over `sources`, lowest priority first.
    ///
    /// For every namespace exposed by any source, each source is pushed as a
    /// content entry if it exposes the namespace, as a filter-only entry if
    /// its filter section only blocks it, and skipped otherwise.
    pub fn new(kind: PackKind, sources: Vec<Arc<dyn ContentSource>>) -> Self {
        let exposed: Vec<BTreeSet<String>> =
            sources.iter().map(|source| source.namespaces(kind)).collect();
        let all_namespaces: BTreeSet<&String> = exposed.iter().flatten().collect();

        let mut namespaces: HashMap<String, NamespaceResolver> = HashMap::new();

        for (source, source_namespaces) in sources.iter().zip(&exposed) {
            let filter = FilterSection::from_source(source.as_ref())
                .filter(|section| !section.is_empty())
                .map(Arc::new);

            for &namespace in &all_namespaces {
                let exposes = source_namespaces.contains(namespace);
                let predicate = filter
                    .as_ref()
                    .filter(|section| section.is_namespace_filtered(namespace))
                    .map(|section| id_filter(Arc::clone(section)));

                if !exposes && predicate.is_none() {
                    continue;
                }

                let resolver = namespaces
                    .entry(namespace.clone())
                    .or_insert_with(|| NamespaceResolver::new(kind, namespace.clone()));
                match (exposes, predicate) {
                    (true, predicate) => resolver.push(Arc::clone(source), predicate),
                    (false, Some(predicate)) => resolver.push_filter_only(source.id(), predicate),
                    (false, None) => {}
                }
            }
        }

        debug!(
            kind = %kind,
            sources = sources.len(),
            namespaces = namespaces.len(),
            "Built aggregate resolver"
        );

        Self {
            kind,
            sources,
            namespaces,
            closed: AtomicBool::new(false),
        }
    }

    /// The pack kind resolved.
    pub fn kind(&self) -> PackKind {
        self.kind
    }

    /// The resolver for one namespace.
    pub fn namespace(&self, namespace: &str) -> Option<&NamespaceResolver> {
        self.namespaces.get(namespace)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release every source. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for source in &self.sources {
            source.close();
        }
        debug!(kind = %self.kind, sources = self.sources.len(), "Closed aggregate resolver");
    }
}

fn id_filter(section: Arc<FilterSection>) -> IdFilter {
    Arc::new(move |id: &ResourceId| section.is_filtered(id))
}

impl ResourceManager for AggregateResolver {
    fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.namespaces.get(id.namespace())?.resolve(id)
    }

    fn resource_stack(&self, id: &ResourceId) -> Vec<Resource> {
        self.namespaces
            .get(id.namespace())
            .map(|resolver| resolver.resolve_stack(id))
            .unwrap_or_default()
    }

    fn list_resources(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Resource>, ResourceError> {
        check_directory(directory)?;
        let mut result = BTreeMap::new();
        for resolver in self.namespaces.values() {
            result.extend(resolver.list_all(directory, filter)?);
        }
        Ok(result)
    }

    fn list_resource_stacks(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Vec<Resource>>, ResourceError> {
        check_directory(directory)?;
        let mut result = BTreeMap::new();
        for resolver in self.namespaces.values() {
            result.extend(resolver.list_all_stacks(directory, filter)?);
        }
        Ok(result)
    }

    fn namespaces(&self) -> BTreeSet<String> {
        self.namespaces.keys().cloned().collect()
    }

    fn list_sources(&self) -> Vec<Arc<dyn ContentSource>> {
        self.sources.clone()
    }
}

impl std::fmt::Debug for AggregateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<_> = self.sources.iter().map(|s| s.id()).collect();
        f.debug_struct("AggregateResolver")
            .field("kind", &self.kind)
            .field("sources", &sources)
            .field("namespaces", &self.namespaces.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
