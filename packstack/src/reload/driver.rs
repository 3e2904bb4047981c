//! How a reload invokes each listener.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::error::ReloadError;
use super::listener::{ReloadContext, ReloadListener};
use crate::observer::ReloadSummary;

/// Invokes listeners on behalf of a reload.
///
/// The plain driver calls [`ReloadListener::reload`] directly; the profiled
/// driver instruments the context first.
pub trait ListenerDriver: Send + Sync + 'static {
    /// Start `listener` with `context`.
    fn run(
        &self,
        listener: Arc<dyn ReloadListener>,
        context: ReloadContext,
    ) -> BoxFuture<'static, Result<(), ReloadError>>;

    /// Called once with the reload's outcome.
    fn finish(&self, _outcome: &Result<(), ReloadError>) {}

    /// Timing summary, once a profiled reload has succeeded.
    fn summary(&self) -> Option<ReloadSummary> {
        None
    }
}

/// Runs listeners without instrumentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleDriver;

impl ListenerDriver for SimpleDriver {
    fn run(
        &self,
        listener: Arc<dyn ReloadListener>,
        context: ReloadContext,
    ) -> BoxFuture<'static, Result<(), ReloadError>> {
        listener.reload(context)
    }
}
