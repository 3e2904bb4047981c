//! One run of the reload pipeline.
//!
//! # State Machine
//!
//! ```text
//! CREATED ──► PREPARING (all listeners) ──► [all prepared] ──► APPLYING L0
//!         ──► APPLYING L1 ──► ... ──► APPLYING Ln-1 ──► DONE
//!
//! any listener failure ──► FAILED (first failure in completion order)
//!                          └─► listeners parked at a barrier see Abandoned
//! ```
//!
//! The chain between listeners is kept as data: each listener's barrier is
//! handed the completion future of the listener before it, folded over the
//! listener list starting from the readiness gate.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::barrier::{BarrierState, PreparationBarrier, StageFuture};
use super::driver::{ListenerDriver, SimpleDriver};
use super::error::ReloadError;
use super::executor::{CountingExecutor, Executor};
use super::listener::{ReloadContext, ReloadListener};
use super::profiled::ProfiledDriver;
use super::progress::{ProgressSnapshot, ReloadProgress};
use super::state::SharedState;
use crate::observer::{NoopObserver, ReloadObserver, ReloadSummary};
use crate::resolver::ResourceManager;

/// Configures and starts a reload.
///
/// # Example
///
/// ```ignore
/// let (main, mut queue) = main_thread();
/// let pool = WorkerPool::new(4)?;
///
/// let handle = ReloadInstance::new(resources, listeners, Arc::new(pool), Arc::new(main))
///     .with_observer(Arc::new(TracingObserver))
///     .profiled(true)
///     .start()?;
///
/// queue.run_until(handle.done()).await?;
/// ```
pub struct ReloadInstance {
    resources: Arc<dyn ResourceManager>,
    listeners: Vec<Arc<dyn ReloadListener>>,
    background: Arc<dyn Executor>,
    main: Arc<dyn Executor>,
    gate: BoxFuture<'static, Result<(), ReloadError>>,
    observer: Arc<dyn ReloadObserver>,
    profiled: bool,
}

impl ReloadInstance {
    /// Prepare a reload of `listeners` over `resources`.
    pub fn new(
        resources: Arc<dyn ResourceManager>,
        listeners: Vec<Arc<dyn ReloadListener>>,
        background: Arc<dyn Executor>,
        main: Arc<dyn Executor>,
    ) -> Self {
        Self {
            resources,
            listeners,
            background,
            main,
            gate: futures::future::ready(Ok(())).boxed(),
            observer: Arc::new(NoopObserver),
            profiled: false,
        }
    }

    /// Hold every listener back until `gate` completes.
    pub fn with_gate<G, E>(mut self, gate: G) -> Self
    where
        G: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        self.gate = gate
            .map(|result| result.map_err(|e| ReloadError::Gate(e.to_string())))
            .boxed();
        self
    }

    /// Report to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ReloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Record per-listener timings.
    pub fn profiled(mut self, profiled: bool) -> Self {
        self.profiled = profiled;
        self
    }

    /// Start the reload on the current Tokio runtime.
    ///
    /// Every listener's [`ReloadListener::prepare_shared_state`] runs before
    /// this returns. Listener futures are spawned; nothing blocks.
    ///
    /// # Errors
    ///
    /// [`ReloadError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(self) -> Result<ReloadHandle, ReloadError> {
        let runtime = Handle::try_current().map_err(|_| ReloadError::NoRuntime)?;

        let driver: Arc<dyn ListenerDriver> = if self.profiled {
            Arc::new(ProfiledDriver::new(Arc::clone(&self.observer)))
        } else {
            Arc::new(SimpleDriver)
        };

        let count = self.listeners.len();
        let progress = Arc::new(ReloadProgress::new(count));
        let state = SharedState::new(self.resources);
        for listener in &self.listeners {
            listener.prepare_shared_state(&state);
        }

        self.observer.reload_started(count);
        debug!(listeners = count, profiled = self.profiled, "Starting reload");

        let background: Arc<dyn Executor> = Arc::new(CountingExecutor::new(
            self.background,
            Arc::clone(progress.background()),
        ));
        // Barrier bookkeeping stays off the progress counters.
        let bookkeeping = Arc::clone(&self.main);
        let main: Arc<dyn Executor> = Arc::new(CountingExecutor::new(
            self.main,
            Arc::clone(progress.main()),
        ));

        // The readiness gate counts as one background task.
        progress.background().start();
        let gate_counter = Arc::clone(progress.background());
        let gate = self.gate;
        let gate: StageFuture = runtime
            .spawn(async move {
                let result = gate.await;
                gate_counter.finish();
                result
            })
            .map(flatten_join)
            .boxed()
            .shared();

        let barrier_state = BarrierState::new(count, Arc::clone(&progress));
        let mut previous = gate.clone();
        let mut completions = Vec::with_capacity(count);

        for (index, listener) in self.listeners.into_iter().enumerate() {
            let name: Arc<str> = Arc::from(listener.name());
            let barrier = PreparationBarrier::new(
                index,
                Arc::clone(&name),
                Arc::clone(&barrier_state),
                previous,
                Arc::clone(&bookkeeping),
            );
            let context = ReloadContext::new(
                state.clone(),
                Arc::clone(&background),
                Arc::clone(&main),
                barrier,
            );

            let gate = gate.clone();
            let driver = Arc::clone(&driver);
            let task = runtime.spawn(async move {
                gate.await?;
                debug!(listener = %name, "Reload listener started");
                let result = driver.run(listener, context).await;
                result.map_err(|e| e.for_listener(&name))
            });

            let done: StageFuture = task.map(flatten_join).boxed().shared();
            previous = done.clone();
            completions.push(done);
        }

        let outcome = Arc::new(OnceLock::new());
        let terminal = {
            let outcome = Arc::clone(&outcome);
            let driver = Arc::clone(&driver);
            let observer = Arc::clone(&self.observer);
            let barrier_state = Arc::clone(&barrier_state);
            runtime.spawn(async move {
                let result = try_join_all(completions).await.map(|_| ());
                driver.finish(&result);
                match &result {
                    Ok(()) => info!(listeners = count, "Reload complete"),
                    Err(e) => {
                        // Listeners parked at their barrier unwind and drop
                        // their prepare output.
                        barrier_state.abandon();
                        observer.reload_failed(e);
                    }
                }
                let _ = outcome.set(result.clone());
                result
            })
        };

        Ok(ReloadHandle {
            done: terminal.map(flatten_join).boxed().shared(),
            progress,
            outcome,
            driver,
        })
    }
}

fn flatten_join(
    joined: Result<Result<(), ReloadError>, tokio::task::JoinError>,
) -> Result<(), ReloadError> {
    joined.unwrap_or_else(|e| Err(ReloadError::from_join(e)))
}

/// Handle to a running reload.
///
/// Cloning is cheap; all clones observe the same reload.
#[derive(Clone)]
pub struct ReloadHandle {
    done: StageFuture,
    progress: Arc<ReloadProgress>,
    outcome: Arc<OnceLock<Result<(), ReloadError>>>,
    driver: Arc<dyn ListenerDriver>,
}

impl ReloadHandle {
    /// Future resolving when the last listener has applied, or with the
    /// first failure.
    pub fn done(&self) -> StageFuture {
        self.done.clone()
    }

    /// Weighted progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress.fraction()
    }

    /// Raw progress counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Whether the reload has finished, successfully or not.
    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// The outcome, once finished.
    pub fn outcome(&self) -> Option<Result<(), ReloadError>> {
        self.outcome.get().cloned()
    }

    /// Timing summary of a successful profiled reload.
    pub fn summary(&self) -> Option<ReloadSummary> {
        self.driver.summary()
    }

    /// Replace the terminal future with one that follows it.
    pub(crate) fn with_done(mut self, done: StageFuture) -> Self {
        self.done = done;
        self
    }
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("progress", &self.progress())
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::executor::{main_thread, WorkerPool};
    use crate::resolver::AggregateResolver;
    use crate::source::PackKind;

    fn resources() -> Arc<dyn ResourceManager> {
        Arc::new(AggregateResolver::empty(PackKind::ClientResources))
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (main, _queue) = main_thread();
        let pool = WorkerPool::new(1).unwrap();
        let result =
            ReloadInstance::new(resources(), Vec::new(), Arc::new(pool), Arc::new(main)).start();
        assert!(matches!(result, Err(ReloadError::NoRuntime)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_reload_completes() {
        let (main, mut queue) = main_thread();
        let pool = WorkerPool::new(1).unwrap();
        let handle = ReloadInstance::new(resources(), Vec::new(), Arc::new(pool), Arc::new(main))
            .start()
            .unwrap();

        queue.run_until(handle.done()).await.unwrap();
        assert!(handle.is_done());
        assert!(matches!(handle.outcome(), Some(Ok(()))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gate_counts_as_background_task() {
        let (main, mut queue) = main_thread();
        let pool = WorkerPool::new(1).unwrap();
        let handle = ReloadInstance::new(resources(), Vec::new(), Arc::new(pool), Arc::new(main))
            .with_gate(async { Err::<(), _>("assets missing") })
            .start()
            .unwrap();

        // With no listeners nothing waits on the gate.
        assert!(queue.run_until(handle.done()).await.is_ok());
        assert_eq!(handle.snapshot().started_background, 1);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(handle.snapshot().finished_background, 1);
        assert_eq!(handle.progress(), 1.0);
    }
}
