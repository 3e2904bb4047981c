//! The query surface shared by every resolver.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Arc;

use crate::resource::{Resource, ResourceError, ResourceId};
use crate::source::ContentSource;

/// Predicate selecting identifiers in a listing.
pub type ListFilter<'a> = dyn Fn(&ResourceId) -> bool + 'a;

/// Read access to a resolved set of resources.
///
/// Implemented by [`NamespaceResolver`](super::NamespaceResolver),
/// [`AggregateResolver`](super::AggregateResolver) and the live
/// [`ResourceDirectory`](crate::directory::ResourceDirectory). Reload
/// listeners receive the resolver under construction through this trait.
pub trait ResourceManager: Send + Sync {
    /// The highest-priority resource for `id`, unless blocked or absent.
    fn resource(&self, id: &ResourceId) -> Option<Resource>;

    /// Every layer's contribution for `id`, lowest priority first.
    fn resource_stack(&self, id: &ResourceId) -> Vec<Resource>;

    /// All resources under `directory` accepted by `filter`, one per id.
    ///
    /// # Errors
    ///
    /// [`ResourceError::TrailingSlash`] if `directory` ends with `/`.
    fn list_resources(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Resource>, ResourceError>;

    /// All layers of every resource under `directory` accepted by `filter`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::TrailingSlash`] if `directory` ends with `/`.
    fn list_resource_stacks(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Vec<Resource>>, ResourceError>;

    /// Known namespace names.
    fn namespaces(&self) -> BTreeSet<String>;

    /// The content sources, lowest priority first.
    fn list_sources(&self) -> Vec<Arc<dyn ContentSource>>;

    /// Open `id`, treating absence as an error.
    fn open(&self, id: &ResourceId) -> Result<Box<dyn Read + Send>, ResourceError> {
        self.resource(id)
            .ok_or_else(|| ResourceError::NotFound(id.clone()))?
            .open()
    }

    /// Read `id` as UTF-8 text, treating absence as an error.
    fn read_to_string(&self, id: &ResourceId) -> Result<String, ResourceError> {
        self.resource(id)
            .ok_or_else(|| ResourceError::NotFound(id.clone()))?
            .read_to_string()
    }
}

/// Reject listing directories with a trailing slash.
pub(crate) fn check_directory(directory: &str) -> Result<(), ResourceError> {
    if directory.ends_with('/') {
        return Err(ResourceError::TrailingSlash(directory.to_string()));
    }
    Ok(())
}
