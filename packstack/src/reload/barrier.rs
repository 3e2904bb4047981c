//! The preparation barrier between prepare and apply phases.
//!
//! Every listener gets its own [`PreparationBarrier`], closing over the
//! shared pending set and the completion future of the listener before it:
//!
//! ```text
//!   ready gate ──► L0 done ──► L1 done ──► L2 done        (previous chain)
//!       ▲            ▲            ▲
//!   wait(L0)     wait(L1)     wait(L2)   ... each also waits on
//!                                            all_prepared
//! ```
//!
//! `wait` releases only when all listeners have prepared and the previous
//! listener has fully applied, so prepares overlap while applies run in
//! list order.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::error::ReloadError;
use super::executor::Executor;
use super::progress::ReloadProgress;

/// A cloneable future resolving when some stage of a reload is done.
pub type StageFuture = Shared<BoxFuture<'static, Result<(), ReloadError>>>;

/// Pending-set bookkeeping shared by every barrier of one reload.
pub(crate) struct BarrierState {
    pending: Mutex<BTreeSet<usize>>,
    trigger: Mutex<Option<oneshot::Sender<()>>>,
    all_prepared: StageFuture,
    progress: Arc<ReloadProgress>,
}

impl BarrierState {
    pub(crate) fn new(listeners: usize, progress: Arc<ReloadProgress>) -> Arc<Self> {
        let (tx, rx) = oneshot::channel();
        let all_prepared = rx
            .map(|received| received.map_err(|_| ReloadError::Abandoned))
            .boxed()
            .shared();

        let state = Arc::new(Self {
            pending: Mutex::new((0..listeners).collect()),
            trigger: Mutex::new(Some(tx)),
            all_prepared,
            progress,
        });
        if listeners == 0 {
            state.fire();
        }
        state
    }

    /// Remove `index` from the pending set; fire when it empties.
    fn mark_prepared(&self, index: usize) {
        let remaining = {
            let mut pending = self.pending.lock();
            if pending.remove(&index) {
                self.progress.listener_prepared();
            }
            pending.len()
        };
        if remaining == 0 {
            self.fire();
        }
    }

    /// Release every parked waiter with [`ReloadError::Abandoned`].
    ///
    /// No-op once all listeners have prepared.
    pub(crate) fn abandon(&self) {
        if self.trigger.lock().take().is_some() {
            debug!("Reload abandoned before all listeners prepared");
        }
    }

    fn fire(&self) {
        if let Some(tx) = self.trigger.lock().take() {
            debug!("All reload listeners prepared");
            let _ = tx.send(());
        }
    }
}

/// Handoff point between a listener's prepare and apply phases.
#[derive(Clone)]
pub struct PreparationBarrier {
    index: usize,
    listener: Arc<str>,
    state: Arc<BarrierState>,
    previous: StageFuture,
    main: Arc<dyn Executor>,
}

impl PreparationBarrier {
    pub(crate) fn new(
        index: usize,
        listener: Arc<str>,
        state: Arc<BarrierState>,
        previous: StageFuture,
        main: Arc<dyn Executor>,
    ) -> Self {
        Self {
            index,
            listener,
            state,
            previous,
            main,
        }
    }

    /// Position of the owning listener in the reload.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the owning listener.
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Signal that prepare output `token` is ready.
    ///
    /// The returned future yields `token` once every listener has prepared
    /// and the previous listener has finished applying. It fails if the
    /// previous listener (or the readiness gate) failed.
    pub fn wait<T: Send + 'static>(&self, token: T) -> BoxFuture<'static, Result<T, ReloadError>> {
        let state = Arc::clone(&self.state);
        let index = self.index;
        self.main.execute(Box::new(move || state.mark_prepared(index)));

        let all_prepared = self.state.all_prepared.clone();
        let previous = self.previous.clone();
        async move {
            futures::future::try_join(all_prepared, previous).await?;
            Ok(token)
        }
        .boxed()
    }
}

impl std::fmt::Debug for PreparationBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparationBarrier")
            .field("index", &self.index)
            .field("listener", &self.listener)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::executor::main_thread;
    use futures::future;

    fn ready() -> StageFuture {
        future::ready(Ok(())).boxed().shared()
    }

    fn barrier(
        index: usize,
        state: &Arc<BarrierState>,
        previous: StageFuture,
        main: Arc<dyn Executor>,
    ) -> PreparationBarrier {
        let name: Arc<str> = Arc::from(format!("l{}", index));
        PreparationBarrier::new(index, name, Arc::clone(state), previous, main)
    }

    #[tokio::test]
    async fn test_wait_releases_after_all_prepared() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let progress = Arc::new(ReloadProgress::new(2));
        let state = BarrierState::new(2, Arc::clone(&progress));

        let first = barrier(0, &state, ready(), Arc::clone(&main));
        let second = barrier(1, &state, ready(), Arc::clone(&main));

        let mut waiting = first.wait("a");
        queue.run_pending();
        assert!((&mut waiting).now_or_never().is_none());
        assert_eq!(progress.snapshot().prepared, 1);

        let other = second.wait("b");
        queue.run_pending();
        assert_eq!(waiting.await.unwrap(), "a");
        assert_eq!(other.await.unwrap(), "b");
        assert_eq!(progress.snapshot().prepared, 2);
    }

    #[tokio::test]
    async fn test_wait_requires_previous() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let state = BarrierState::new(1, Arc::new(ReloadProgress::new(1)));

        let (tx, rx) = oneshot::channel::<()>();
        let previous = rx.map(|r| r.map_err(|_| ReloadError::Abandoned)).boxed().shared();
        let only = barrier(0, &state, previous, main);

        let mut waiting = only.wait(7);
        queue.run_pending();
        assert!((&mut waiting).now_or_never().is_none());

        tx.send(()).unwrap();
        assert_eq!(waiting.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_failed_previous_fails_wait() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let state = BarrierState::new(1, Arc::new(ReloadProgress::new(1)));

        let previous = future::ready(Err(ReloadError::failed("earlier listener")))
            .boxed()
            .shared();
        let only = barrier(0, &state, previous, main);

        let waiting = only.wait(());
        queue.run_pending();
        assert!(matches!(waiting.await, Err(ReloadError::Failed(_))));
    }

    #[tokio::test]
    async fn test_abandon_releases_parked_waiters() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let state = BarrierState::new(2, Arc::new(ReloadProgress::new(2)));
        let first = barrier(0, &state, ready(), main);

        let waiting = first.wait(());
        queue.run_pending();
        state.abandon();
        assert!(matches!(waiting.await, Err(ReloadError::Abandoned)));
    }

    #[tokio::test]
    async fn test_abandon_after_fire_is_noop() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let state = BarrierState::new(1, Arc::new(ReloadProgress::new(1)));
        let only = barrier(0, &state, ready(), main);

        let waiting = only.wait(3);
        queue.run_pending();
        state.abandon();
        assert_eq!(waiting.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_repeated_wait_counts_once() {
        let (main, mut queue) = main_thread();
        let main: Arc<dyn Executor> = Arc::new(main);
        let progress = Arc::new(ReloadProgress::new(2));
        let state = BarrierState::new(2, Arc::clone(&progress));
        let first = barrier(0, &state, ready(), main);

        let _a = first.wait(());
        let _b = first.wait(());
        queue.run_pending();
        assert_eq!(progress.snapshot().prepared, 1);
    }
}
