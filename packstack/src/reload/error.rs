//! Reload error types.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::resource::ResourceError;

/// Errors produced while running a reload.
///
/// Cloneable so that a single failure can be observed by every waiter of
/// the shared terminal future.
#[derive(Debug, Clone, Error)]
pub enum ReloadError {
    /// A listener's prepare or apply phase failed.
    #[error("Reload listener '{listener}' failed: {source}")]
    Listener {
        listener: String,
        #[source]
        source: Box<ReloadError>,
    },

    /// Reading a resource failed.
    #[error(transparent)]
    Resource(Arc<ResourceError>),

    /// A listener reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    /// A listener task panicked.
    #[error("Reload task panicked: {0}")]
    Panicked(String),

    /// An executor dropped a task before running it.
    #[error("Reload task was dropped before completing")]
    TaskDropped,

    /// The reload was torn down before every listener prepared.
    #[error("Reload was abandoned")]
    Abandoned,

    /// The reload was started outside a Tokio runtime.
    #[error("Reload must be started from within a Tokio runtime")]
    NoRuntime,

    /// The readiness gate failed.
    #[error("Readiness gate failed: {0}")]
    Gate(String),

    /// An executor could not be created.
    #[error("Failed to create executor: {0}")]
    Executor(String),
}

impl ReloadError {
    /// A listener failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        ReloadError::Failed(message.into())
    }

    /// Attribute this error to `listener`, unless already attributed.
    pub fn for_listener(self, listener: &str) -> Self {
        match self {
            e @ ReloadError::Listener { .. } => e,
            other => ReloadError::Listener {
                listener: listener.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The listener this error is attributed to, if any.
    pub fn listener(&self) -> Option<&str> {
        match self {
            ReloadError::Listener { listener, .. } => Some(listener),
            _ => None,
        }
    }

    /// The error with listener attribution removed.
    pub fn root(&self) -> &ReloadError {
        match self {
            ReloadError::Listener { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn from_join(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            ReloadError::Panicked(panic_message(error.into_panic().as_ref()))
        } else {
            ReloadError::TaskDropped
        }
    }
}

impl From<ResourceError> for ReloadError {
    fn from(e: ResourceError) -> Self {
        ReloadError::Resource(Arc::new(e))
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;

    #[test]
    fn test_for_listener_wraps_once() {
        let err = ReloadError::failed("bad model").for_listener("models");
        assert_eq!(err.listener(), Some("models"));
        assert_eq!(err.to_string(), "Reload listener 'models' failed: bad model");

        let rewrapped = err.clone().for_listener("sounds");
        assert_eq!(rewrapped.listener(), Some("models"));
    }

    #[test]
    fn test_root_strips_attribution() {
        let err = ReloadError::TaskDropped.for_listener("models");
        assert!(matches!(err.root(), ReloadError::TaskDropped));
    }

    #[test]
    fn test_from_resource_error() {
        let id = ResourceId::parse("a:x").unwrap();
        let err: ReloadError = ResourceError::NotFound(id).into();
        assert!(matches!(err, ReloadError::Resource(_)));
        assert!(err.to_string().contains("a:x"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
