//! Resolved resources.
//!
//! A [`Resource`] records *who* provides an identifier. Nothing is read
//! until [`Resource::open`] or [`Resource::metadata`] is called, so I/O
//! failures surface at open time rather than during resolution.

use std::fmt;
use std::io::Read;
use std::sync::{Arc, OnceLock};

use super::error::ResourceError;
use super::id::ResourceId;
use super::metadata::ResourceMetadata;
use crate::source::{ContentSource, StreamOpener};

/// Lazily produces the parsed metadata of a resource.
pub type MetadataOpener = Arc<dyn Fn() -> Result<ResourceMetadata, ResourceError> + Send + Sync>;

/// A metadata opener for resources without a sidecar.
pub fn no_metadata() -> MetadataOpener {
    Arc::new(|| Ok(ResourceMetadata::empty()))
}

/// A metadata opener that parses the sidecar behind `opener`.
pub fn metadata_from_stream(metadata_id: ResourceId, opener: StreamOpener) -> MetadataOpener {
    Arc::new(move || {
        let reader = opener().map_err(|e| ResourceError::io(&metadata_id, e))?;
        ResourceMetadata::from_reader(&metadata_id, reader)
    })
}

/// A resource bound to the source that won resolution for its identifier.
///
/// Cloning is cheap; clones share the metadata cache.
#[derive(Clone)]
pub struct Resource {
    id: ResourceId,
    source: Arc<dyn ContentSource>,
    opener: StreamOpener,
    metadata_opener: MetadataOpener,
    metadata: Arc<OnceLock<Arc<ResourceMetadata>>>,
}

impl Resource {
    /// Bind an identifier to its providing source.
    pub fn new(
        id: ResourceId,
        source: Arc<dyn ContentSource>,
        opener: StreamOpener,
        metadata_opener: MetadataOpener,
    ) -> Self {
        Self {
            id,
            source,
            opener,
            metadata_opener,
            metadata: Arc::new(OnceLock::new()),
        }
    }

    /// The identifier this resource was resolved for.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// The source supplying the content.
    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Identifier of the source supplying the content.
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Open the content stream.
    pub fn open(&self) -> Result<Box<dyn Read + Send>, ResourceError> {
        (self.opener)().map_err(|e| ResourceError::io(&self.id, e))
    }

    /// Read the whole content into memory.
    pub fn read_to_vec(&self) -> Result<Vec<u8>, ResourceError> {
        let mut reader = self.open()?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| ResourceError::io(&self.id, e))?;
        Ok(buf)
    }

    /// Read the whole content as UTF-8 text.
    pub fn read_to_string(&self) -> Result<String, ResourceError> {
        let mut reader = self.open()?;
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| ResourceError::io(&self.id, e))?;
        Ok(text)
    }

    /// The parsed sidecar metadata.
    ///
    /// Parsed on first access and cached afterwards. A failed read is not
    /// cached, so a later call retries.
    pub fn metadata(&self) -> Result<Arc<ResourceMetadata>, ResourceError> {
        if let Some(cached) = self.metadata.get() {
            return Ok(Arc::clone(cached));
        }
        let parsed = Arc::new((self.metadata_opener)()?);
        Ok(Arc::clone(self.metadata.get_or_init(|| parsed)))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("source", &self.source.id())
            .field("metadata_loaded", &self.metadata.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, PackKind};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source() -> Arc<dyn ContentSource> {
        MemorySource::builder("test")
            .text(PackKind::ClientResources, "a:x", "hello")
            .build()
            .unwrap()
            .into_shared()
    }

    fn opener(text: &'static str) -> StreamOpener {
        Arc::new(move || Ok(Box::new(text.as_bytes()) as Box<dyn Read + Send>))
    }

    #[test]
    fn test_read_to_string() {
        let id = ResourceId::parse("a:x").unwrap();
        let resource = Resource::new(id, source(), opener("hello"), no_metadata());
        assert_eq!(resource.read_to_string().unwrap(), "hello");
        assert_eq!(resource.source_id(), "test");
    }

    #[test]
    fn test_open_error_surfaces_at_open_time() {
        let id = ResourceId::parse("a:x").unwrap();
        let failing: StreamOpener =
            Arc::new(|| Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked")));
        let resource = Resource::new(id, source(), failing, no_metadata());

        let err = resource.read_to_vec().unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }

    #[test]
    fn test_metadata_is_parsed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let meta_opener: MetadataOpener = Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(ResourceMetadata::empty())
        });

        let id = ResourceId::parse("a:x").unwrap();
        let resource = Resource::new(id, source(), opener("x"), meta_opener);
        let clone = resource.clone();

        resource.metadata().unwrap();
        resource.metadata().unwrap();
        clone.metadata().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_metadata_from_stream_parses_sidecar() {
        let id = ResourceId::parse("a:x").unwrap();
        let meta = metadata_from_stream(id.metadata_id(), opener(r#"{"frames": [1, 2]}"#));
        let resource = Resource::new(id, source(), opener("x"), meta);

        let parsed = resource.metadata().unwrap();
        assert!(parsed.raw_section("frames").is_some());
    }
}
