//! Resource identifiers, resolved resources and their metadata.
//!
//! # Overview
//!
//! - [`ResourceId`]: the `namespace:path` resolution key
//! - [`Resource`]: an identifier bound to the source that supplies it
//! - [`ResourceMetadata`]: the parsed `<path>.meta` sidecar of a resource
//!
//! Resolution only answers "who provides this"; bytes are read when a
//! [`Resource`] is opened.

mod error;
mod handle;
mod id;
mod metadata;

pub use error::{ResourceError, ResourceResult};
pub use handle::{metadata_from_stream, no_metadata, MetadataOpener, Resource};
pub use id::{
    is_valid_namespace, is_valid_namespace_char, is_valid_path_char, ResourceId,
    DEFAULT_NAMESPACE, METADATA_SUFFIX, NAMESPACE_SEPARATOR,
};
pub use metadata::ResourceMetadata;
