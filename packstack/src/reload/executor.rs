//! Executors driving reload work.
//!
//! # Overview
//!
//! A reload uses two executors:
//!
//! - a background executor ([`WorkerPool`]) running prepare work in
//!   parallel, in no particular order
//! - a main-thread executor ([`MainThread`]) running apply work and barrier
//!   bookkeeping strictly in submission order, one job at a time
//!
//! ```text
//!   listener ──execute──► MainThread ──channel──► MainThreadQueue::run_until
//!                                                  (owning task, serial)
//!   listener ──execute──► WorkerPool ──────────► rayon threads (parallel)
//! ```
//!
//! Both are used through the [`Executor`] trait, so callers can supply
//! their own.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace};

use super::error::{panic_message, ReloadError};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs.
pub trait Executor: Send + Sync {
    /// Schedule `job` for execution.
    fn execute(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Submitting closures with a result.
pub trait ExecutorExt: Executor {
    /// Run `task` on this executor and return a future of its result.
    ///
    /// A panic inside `task` resolves the future with
    /// [`ReloadError::Panicked`]; a job dropped without running resolves it
    /// with [`ReloadError::TaskDropped`].
    fn submit<T, F>(&self, task: F) -> Submitted<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.execute(Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| ReloadError::Panicked(panic_message(payload.as_ref())));
            // The receiver may have been abandoned.
            let _ = tx.send(result);
        }));
        Submitted { rx }
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}

/// Future returned by [`ExecutorExt::submit`].
pub struct Submitted<T> {
    rx: oneshot::Receiver<Result<T, ReloadError>>,
}

impl<T> Future for Submitted<T> {
    type Output = Result<T, ReloadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ReloadError::TaskDropped)))
    }
}

// =============================================================================
// Worker Pool
// =============================================================================

/// Background executor backed by a rayon thread pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Create a pool with `threads` workers; `0` picks the CPU count.
    pub fn new(threads: usize) -> Result<Self, ReloadError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("packstack-worker-{}", index))
            .panic_handler(|payload| {
                error!(panic = %panic_message(payload.as_ref()), "Background job panicked");
            })
            .build()
            .map_err(|e| ReloadError::Executor(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        self.pool.spawn(job);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

// =============================================================================
// Main Thread
// =============================================================================

/// Create a main-thread executor and the queue that runs its jobs.
pub fn main_thread() -> (MainThread, MainThreadQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainThread { tx }, MainThreadQueue { rx, executed: 0 })
}

/// Submits jobs to a [`MainThreadQueue`].
///
/// Jobs run in submission order, one at a time, on whichever task drives
/// the queue.
#[derive(Clone, Debug)]
pub struct MainThread {
    tx: mpsc::UnboundedSender<Job>,
}

impl Executor for MainThread {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            trace!("Main thread queue closed, dropping job");
        }
    }
}

/// The receiving end of a [`MainThread`] executor.
#[derive(Debug)]
pub struct MainThreadQueue {
    rx: mpsc::UnboundedReceiver<Job>,
    executed: u64,
}

impl MainThreadQueue {
    /// Run every job queued so far and return how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.run_job(job);
            count += 1;
        }
        count
    }

    /// Run jobs until `future` completes, then return its output.
    ///
    /// Jobs still queued when `future` completes stay queued.
    pub async fn run_until<F: Future>(&mut self, future: F) -> F::Output {
        tokio::pin!(future);
        loop {
            tokio::select! {
                biased;
                output = &mut future => return output,
                Some(job) = self.rx.recv() => self.run_job(job),
            }
        }
    }

    /// Run jobs until every [`MainThread`] handle has been dropped.
    pub async fn run(&mut self) {
        while let Some(job) = self.rx.recv().await {
            self.run_job(job);
        }
    }

    /// Total number of jobs run by this queue.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    fn run_job(&mut self, job: Job) {
        job();
        self.executed += 1;
    }
}

// =============================================================================
// Counting
// =============================================================================

/// Started and finished task counts of one executor.
#[derive(Debug, Default)]
pub struct TaskCounter {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl TaskCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks handed to the executor.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    /// Tasks that have finished running.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn start(&self) {
        self.started.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn finish(&self) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }
}

/// Marks a task finished when dropped, including on panic.
struct FinishGuard(Arc<TaskCounter>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Executor wrapper that counts started and finished jobs.
#[derive(Clone)]
pub struct CountingExecutor {
    inner: Arc<dyn Executor>,
    counter: Arc<TaskCounter>,
}

impl CountingExecutor {
    /// Wrap `inner`, recording into `counter`.
    pub fn new(inner: Arc<dyn Executor>, counter: Arc<TaskCounter>) -> Self {
        Self { inner, counter }
    }

    /// The counter being recorded into.
    pub fn counter(&self) -> &Arc<TaskCounter> {
        &self.counter
    }
}

impl Executor for CountingExecutor {
    fn execute(&self, job: Job) {
        self.counter.start();
        let guard = FinishGuard(Arc::clone(&self.counter));
        self.inner.execute(Box::new(move || {
            let _guard = guard;
            job();
        }));
    }
}
