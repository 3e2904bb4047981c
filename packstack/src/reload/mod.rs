//! Two-phase, barrier-synchronized reloads.
//!
//! # Overview
//!
//! A reload drives an ordered list of [`ReloadListener`]s through two
//! phases:
//!
//! 1. **Prepare**: every listener reads resources and builds its output on
//!    the background executor, all in parallel.
//! 2. **Apply**: once *every* listener has reached its
//!    [`PreparationBarrier`], outputs are installed on the main executor in
//!    listener order.
//!
//! # Architecture
//!
//! ```text
//!   ready gate
//!       │
//!       ▼
//!   L0 prepare ──┐
//!   L1 prepare ──┼──► all prepared ──► apply L0 ──► apply L1 ──► apply L2
//!   L2 prepare ──┘                                                  │
//!                                                                   ▼
//!                                       ReloadHandle { done(), progress() }
//! ```
//!
//! The terminal future fails with the first listener failure, in completion
//! order. Sibling listener tasks are detached, not cancelled.
//!
//! # Example
//!
//! ```ignore
//! use packstack::reload::{main_thread, Prepared, ReloadInstance, WorkerPool};
//!
//! let (main, mut queue) = main_thread();
//! let pool = Arc::new(WorkerPool::new(0)?);
//! let listeners = vec![Prepared::shared(Languages), Prepared::shared(Models)];
//!
//! let handle = ReloadInstance::new(resources, listeners, pool, Arc::new(main)).start()?;
//! queue.run_until(handle.done()).await?;
//! ```

mod barrier;
mod driver;
mod error;
mod executor;
mod instance;
mod listener;
mod prepared;
mod profiled;
mod progress;
mod state;

pub use barrier::{PreparationBarrier, StageFuture};
pub use driver::{ListenerDriver, SimpleDriver};
pub use error::ReloadError;
pub use executor::{
    main_thread, CountingExecutor, Executor, ExecutorExt, Job, MainThread, MainThreadQueue,
    Submitted, TaskCounter, WorkerPool,
};
pub use instance::{ReloadHandle, ReloadInstance};
pub use listener::{ReloadContext, ReloadListener};
pub use prepared::{Prepared, PreparedListener};
pub use profiled::{PhaseTimer, ProfiledDriver, TimedExecutor};
pub use progress::{ProgressSnapshot, ReloadProgress};
pub use state::{SharedState, StateKey};
