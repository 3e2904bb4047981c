//! Listeners split into a prepare function and an apply function.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::error::ReloadError;
use super::executor::ExecutorExt;
use super::listener::{ReloadContext, ReloadListener};
use super::state::SharedState;

/// A listener with separate prepare and apply steps.
///
/// `prepare` runs on the background executor and may run concurrently with
/// other listeners' prepares. `apply` runs on the main executor after every
/// listener has prepared, in listener order.
///
/// # Example
///
/// ```ignore
/// struct LanguageTable;
///
/// impl PreparedListener for LanguageTable {
///     type Output = BTreeMap<ResourceId, String>;
///
///     fn name(&self) -> &str { "languages" }
///
///     fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError> {
///         let listed = state.resources().list_resources("lang", &|_| true)?;
///         listed.into_iter().map(|(id, r)| Ok((id, r.read_to_string()?))).collect()
///     }
///
///     fn apply(&self, output: Self::Output, _state: &SharedState) -> Result<(), ReloadError> {
///         install(output);
///         Ok(())
///     }
/// }
///
/// directory.register_reload_listener(Prepared::shared(LanguageTable));
/// ```
pub trait PreparedListener: Send + Sync + 'static {
    /// Output handed from prepare to apply.
    type Output: Send + 'static;

    /// Name used in logs and timing reports.
    fn name(&self) -> &str;

    /// Seed cross-listener values before any listener starts.
    fn prepare_shared_state(&self, _state: &SharedState) {}

    /// Build the output from the reloaded resources.
    fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError>;

    /// Install the output.
    fn apply(&self, output: Self::Output, state: &SharedState) -> Result<(), ReloadError>;
}

/// Adapts a [`PreparedListener`] to [`ReloadListener`].
pub struct Prepared<L> {
    inner: Arc<L>,
}

impl<L: PreparedListener> Prepared<L> {
    /// Wrap `listener`.
    pub fn new(listener: L) -> Self {
        Self {
            inner: Arc::new(listener),
        }
    }

    /// Wrap `listener` ready for registration.
    pub fn shared(listener: L) -> Arc<dyn ReloadListener> {
        Arc::new(Self::new(listener))
    }

    /// The wrapped listener.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: PreparedListener> ReloadListener for Prepared<L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn prepare_shared_state(&self, state: &SharedState) {
        self.inner.prepare_shared_state(state);
    }

    fn reload(self: Arc<Self>, context: ReloadContext) -> BoxFuture<'static, Result<(), ReloadError>> {
        async move {
            let listener = Arc::clone(&self.inner);
            let state = context.state().clone();
            let output = context
                .background()
                .submit(move || listener.prepare(&state))
                .await??;

            let output = context.wait(output).await?;

            let listener = Arc::clone(&self.inner);
            let state = context.state().clone();
            context
                .main()
                .submit(move || listener.apply(output, &state))
                .await?
        }
        .boxed()
    }
}
