//! Observability port for reloads.
//!
//! The reload pipeline reports through an injected [`ReloadObserver`]
//! instead of process-wide logger or profiler state. [`NoopObserver`] is the
//! default; [`TracingObserver`] writes the reports to `tracing`.

use std::time::Duration;

use tracing::{error, info};

use crate::reload::ReloadError;

/// Timing of one listener in a profiled reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerTiming {
    /// Listener name.
    pub name: String,
    /// Wall time spent in background jobs.
    pub prepare: Duration,
    /// Number of background jobs run.
    pub prepare_tasks: u64,
    /// Wall time spent in main-thread jobs.
    pub apply: Duration,
    /// Number of main-thread jobs run.
    pub apply_tasks: u64,
}

/// Summary of a profiled reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Wall time from start to the last listener's completion.
    pub total: Duration,
    /// Sum of apply time across listeners: how long the main thread was busy.
    pub blocking: Duration,
    /// Per-listener timings, in listener order.
    pub listeners: Vec<ListenerTiming>,
}

/// Receives reload lifecycle reports.
///
/// All methods default to doing nothing.
pub trait ReloadObserver: Send + Sync {
    /// A reload over `listeners` listeners has started.
    fn reload_started(&self, _listeners: usize) {}

    /// A profiled listener has finished.
    fn listener_finished(&self, _timing: &ListenerTiming) {}

    /// A profiled reload has completed successfully.
    fn reload_finished(&self, _summary: &ReloadSummary) {}

    /// A reload has failed.
    fn reload_failed(&self, _error: &ReloadError) {}
}

/// Observer that ignores every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReloadObserver for NoopObserver {}

/// Observer that logs reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ReloadObserver for TracingObserver {
    fn reload_started(&self, listeners: usize) {
        info!(listeners, "Reload started");
    }

    fn listener_finished(&self, timing: &ListenerTiming) {
        info!(
            listener = %timing.name,
            prepare_ms = timing.prepare.as_millis() as u64,
            prepare_tasks = timing.prepare_tasks,
            apply_ms = timing.apply.as_millis() as u64,
            apply_tasks = timing.apply_tasks,
            "Reload listener timing"
        );
    }

    fn reload_finished(&self, summary: &ReloadSummary) {
        info!(
            total_ms = summary.total.as_millis() as u64,
            blocking_ms = summary.blocking.as_millis() as u64,
            listeners = summary.listeners.len(),
            "Reload finished"
        );
    }

    fn reload_failed(&self, error: &ReloadError) {
        error!(error = %error, "Reload failed");
    }
}
