//! Per-listener timing of reloads.
//!
//! [`ProfiledDriver`] swaps each listener's executors for [`TimedExecutor`]s
//! recording wall time and job counts into atomic counters. Scheduling is
//! unchanged. When the reload succeeds, one [`ListenerTiming`] per listener
//! and a [`ReloadSummary`] are sent to the observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::driver::ListenerDriver;
use super::error::ReloadError;
use super::executor::{Executor, Job};
use super::listener::{ReloadContext, ReloadListener};
use crate::observer::{ListenerTiming, ReloadObserver, ReloadSummary};

/// Accumulated wall time and job count.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    nanos: AtomicU64,
    tasks: AtomicU64,
}

impl PhaseTimer {
    fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
        self.tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// Total time recorded.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    /// Number of jobs recorded.
    pub fn tasks(&self) -> u64 {
        self.tasks.load(Ordering::Relaxed)
    }
}

/// Executor wrapper timing every job it runs.
pub struct TimedExecutor {
    inner: Arc<dyn Executor>,
    timer: Arc<PhaseTimer>,
}

impl TimedExecutor {
    /// Wrap `inner`, recording into `timer`.
    pub fn new(inner: Arc<dyn Executor>, timer: Arc<PhaseTimer>) -> Self {
        Self { inner, timer }
    }
}

impl Executor for TimedExecutor {
    fn execute(&self, job: Job) {
        let timer = Arc::clone(&self.timer);
        self.inner.execute(Box::new(move || {
            let started = Instant::now();
            job();
            timer.record(started.elapsed());
        }));
    }
}

struct ListenerProfile {
    name: String,
    prepare: Arc<PhaseTimer>,
    apply: Arc<PhaseTimer>,
}

impl ListenerProfile {
    fn timing(&self) -> ListenerTiming {
        ListenerTiming {
            name: self.name.clone(),
            prepare: self.prepare.elapsed(),
            prepare_tasks: self.prepare.tasks(),
            apply: self.apply.elapsed(),
            apply_tasks: self.apply.tasks(),
        }
    }
}

/// Driver recording per-listener timings.
pub struct ProfiledDriver {
    started: Instant,
    profiles: Mutex<Vec<ListenerProfile>>,
    observer: Arc<dyn ReloadObserver>,
    summary: OnceLock<ReloadSummary>,
}

impl ProfiledDriver {
    /// Create a driver reporting to `observer`; the clock starts now.
    pub fn new(observer: Arc<dyn ReloadObserver>) -> Self {
        Self {
            started: Instant::now(),
            profiles: Mutex::new(Vec::new()),
            observer,
            summary: OnceLock::new(),
        }
    }

    /// Current timings, in the order listeners were started.
    pub fn timings(&self) -> Vec<ListenerTiming> {
        self.profiles.lock().iter().map(ListenerProfile::timing).collect()
    }
}

impl ListenerDriver for ProfiledDriver {
    fn run(
        &self,
        listener: Arc<dyn ReloadListener>,
        context: ReloadContext,
    ) -> BoxFuture<'static, Result<(), ReloadError>> {
        let prepare = Arc::new(PhaseTimer::default());
        let apply = Arc::new(PhaseTimer::default());
        self.profiles.lock().push(ListenerProfile {
            name: listener.name().to_string(),
            prepare: Arc::clone(&prepare),
            apply: Arc::clone(&apply),
        });

        let background = Arc::new(TimedExecutor::new(Arc::clone(context.background()), prepare));
        let main = Arc::new(TimedExecutor::new(Arc::clone(context.main()), apply));
        listener.reload(context.with_executors(background, main))
    }

    fn finish(&self, outcome: &Result<(), ReloadError>) {
        if outcome.is_err() {
            return;
        }

        let listeners = self.timings();
        for timing in &listeners {
            self.observer.listener_finished(timing);
        }
        let summary = ReloadSummary {
            total: self.started.elapsed(),
            blocking: listeners.iter().map(|timing| timing.apply).sum(),
            listeners,
        };
        self.observer.reload_finished(&summary);
        let _ = self.summary.set(summary);
    }

    fn summary(&self) -> Option<ReloadSummary> {
        self.summary.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::executor::main_thread;

    #[test]
    fn test_timed_executor_records_jobs() {
        let (main, mut queue) = main_thread();
        let timer = Arc::new(PhaseTimer::default());
        let timed = TimedExecutor::new(Arc::new(main), Arc::clone(&timer));

        timed.execute(Box::new(|| std::thread::sleep(Duration::from_millis(5))));
        timed.execute(Box::new(|| {}));
        assert_eq!(timer.tasks(), 0);

        queue.run_pending();
        assert_eq!(timer.tasks(), 2);
        assert!(timer.elapsed() >= Duration::from_millis(5));
    }

    #[derive(Default)]
    struct Recording {
        timings: Mutex<Vec<ListenerTiming>>,
        summaries: Mutex<Vec<ReloadSummary>>,
    }

    impl ReloadObserver for Recording {
        fn listener_finished(&self, timing: &ListenerTiming) {
            self.timings.lock().push(timing.clone());
        }

        fn reload_finished(&self, summary: &ReloadSummary) {
            self.summaries.lock().push(summary.clone());
        }
    }

    #[test]
    fn test_failed_reload_reports_nothing() {
        let observer = Arc::new(Recording::default());
        let driver = ProfiledDriver::new(observer.clone());

        driver.finish(&Err(ReloadError::Abandoned));
        assert!(driver.summary().is_none());
        assert!(observer.summaries.lock().is_empty());
    }

    #[test]
    fn test_successful_reload_reports_summary() {
        let observer = Arc::new(Recording::default());
        let driver = ProfiledDriver::new(observer.clone());

        driver.finish(&Ok(()));
        let summary = driver.summary().unwrap();
        assert!(summary.listeners.is_empty());
        assert_eq!(summary.blocking, Duration::ZERO);
        assert_eq!(observer.summaries.lock().len(), 1);
    }
}
