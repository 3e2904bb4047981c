//! Reload progress accounting.
//!
//! Progress is a weighted heuristic over three counters:
//!
//! ```text
//!            2·finished_background + 2·finished_main + prepared
//! progress = ──────────────────────────────────────────────────
//!             2·started_background + 2·started_main + listeners
//! ```
//!
//! It may move backwards when new tasks are started faster than old ones
//! finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::executor::TaskCounter;

const TASK_WEIGHT: usize = 2;
const PREPARED_WEIGHT: usize = 1;

/// Live counters of one reload.
#[derive(Debug)]
pub struct ReloadProgress {
    background: Arc<TaskCounter>,
    main: Arc<TaskCounter>,
    prepared: AtomicUsize,
    listeners: usize,
}

impl ReloadProgress {
    /// Counters for a reload over `listeners` listeners.
    pub fn new(listeners: usize) -> Self {
        Self {
            background: Arc::new(TaskCounter::new()),
            main: Arc::new(TaskCounter::new()),
            prepared: AtomicUsize::new(0),
            listeners,
        }
    }

    /// Background task counter.
    pub fn background(&self) -> &Arc<TaskCounter> {
        &self.background
    }

    /// Main-thread task counter.
    pub fn main(&self) -> &Arc<TaskCounter> {
        &self.main
    }

    pub(crate) fn listener_prepared(&self) {
        self.prepared.fetch_add(1, Ordering::AcqRel);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        // Finished counts are read before started counts so that a snapshot
        // never shows more finished than started tasks.
        let finished_background = self.background.finished();
        let finished_main = self.main.finished();
        ProgressSnapshot {
            started_background: self.background.started(),
            finished_background,
            started_main: self.main.started(),
            finished_main,
            prepared: self.prepared.load(Ordering::Acquire),
            listeners: self.listeners,
        }
    }

    /// Current progress in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        self.snapshot().fraction()
    }
}

/// Copy of the reload counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub started_background: usize,
    pub finished_background: usize,
    pub started_main: usize,
    pub finished_main: usize,
    pub prepared: usize,
    pub listeners: usize,
}

impl ProgressSnapshot {
    /// Weighted progress in `[0, 1]`; `1.0` when nothing is tracked.
    pub fn fraction(&self) -> f32 {
        let done = TASK_WEIGHT * self.finished_background
            + TASK_WEIGHT * self.finished_main
            + PREPARED_WEIGHT * self.prepared;
        let total = TASK_WEIGHT * self.started_background
            + TASK_WEIGHT * self.started_main
            + PREPARED_WEIGHT * self.listeners;
        if total == 0 {
            return 1.0;
        }
        (done as f32 / total as f32).min(1.0)
    }
}
