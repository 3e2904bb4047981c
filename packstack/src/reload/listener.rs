//! The reload listener contract.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::barrier::PreparationBarrier;
use super::error::ReloadError;
use super::executor::Executor;
use super::state::SharedState;
use crate::resolver::ResourceManager;

/// A subsystem rebuilding derived state from reloaded resources.
///
/// A well-behaved listener:
///
/// 1. runs its prepare work on [`ReloadContext::background`], reading
///    resources only;
/// 2. calls [`ReloadContext::wait`] with the prepare output;
/// 3. applies that output through [`ReloadContext::main`] once the wait
///    resolves.
///
/// Listeners that split cleanly into those phases can implement
/// [`PreparedListener`](super::PreparedListener) instead.
pub trait ReloadListener: Send + Sync + 'static {
    /// Name used in logs and timing reports.
    fn name(&self) -> &str;

    /// Seed cross-listener values before any listener starts.
    fn prepare_shared_state(&self, _state: &SharedState) {}

    /// Run both phases; the future resolves once this listener has applied.
    fn reload(self: Arc<Self>, context: ReloadContext) -> BoxFuture<'static, Result<(), ReloadError>>;
}

/// Everything one listener receives for a reload.
#[derive(Clone)]
pub struct ReloadContext {
    state: SharedState,
    background: Arc<dyn Executor>,
    main: Arc<dyn Executor>,
    barrier: PreparationBarrier,
}

impl ReloadContext {
    pub(crate) fn new(
        state: SharedState,
        background: Arc<dyn Executor>,
        main: Arc<dyn Executor>,
        barrier: PreparationBarrier,
    ) -> Self {
        Self {
            state,
            background,
            main,
            barrier,
        }
    }

    /// Replace both executors, keeping state and barrier.
    pub(crate) fn with_executors(self, background: Arc<dyn Executor>, main: Arc<dyn Executor>) -> Self {
        Self {
            background,
            main,
            ..self
        }
    }

    /// Shared state of the reload.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The resources being reloaded.
    pub fn resources(&self) -> &dyn ResourceManager {
        self.state.resources()
    }

    /// Executor for prepare work.
    pub fn background(&self) -> &Arc<dyn Executor> {
        &self.background
    }

    /// Executor for apply work.
    pub fn main(&self) -> &Arc<dyn Executor> {
        &self.main
    }

    /// This listener's preparation barrier.
    pub fn barrier(&self) -> &PreparationBarrier {
        &self.barrier
    }

    /// Shorthand for [`PreparationBarrier::wait`].
    pub fn wait<T: Send + 'static>(&self, token: T) -> BoxFuture<'static, Result<T, ReloadError>> {
        self.barrier.wait(token)
    }
}

impl std::fmt::Debug for ReloadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadContext")
            .field("barrier", &self.barrier)
            .finish()
    }
}
