//! `reload` command - run a full two-phase reload over the pack stack.
//!
//! Four inventory listeners stand in for application subsystems:
//!
//! | Listener   | Prepare (background)                   | Apply (main)        |
//! |------------|----------------------------------------|---------------------|
//! | namespaces | count resources per namespace          | store counts        |
//! | overrides  | find ids supplied by more than one pack| store override list |
//! | bytes      | read every resource                    | store byte totals   |
//! | metadata   | parse every sidecar                    | store parse errors  |

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use packstack::config::{ProfileMode, SwapTiming};
use packstack::directory::ResourceDirectory;
use packstack::observer::{ReloadSummary, TracingObserver};
use packstack::reload::{
    main_thread, Prepared, PreparedListener, ReloadError, ReloadHandle, ReloadListener,
    SharedState, WorkerPool,
};
use packstack::resource::ResourceId;
use parking_lot::Mutex;

use super::common::format_bytes;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Progress bar resolution.
const PROGRESS_STEPS: u64 = 1000;

/// Progress bar refresh interval.
const PROGRESS_TICK: Duration = Duration::from_millis(50);

/// Overrides listed in the report.
const MAX_OVERRIDES_SHOWN: usize = 10;

/// Arguments for the reload command.
#[derive(Debug, Args)]
pub struct ReloadArgs {
    /// Background worker threads (0 = one per CPU)
    #[arg(long)]
    pub workers: Option<usize>,

    /// When the new resolver becomes current (before_reload, on_success)
    #[arg(long)]
    pub swap: Option<SwapTiming>,

    /// Record and print per-listener timings
    #[arg(long)]
    pub profile: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

// ===== Inventory listeners =====

#[derive(Debug, Default)]
struct InventoryReport {
    namespaces: BTreeMap<String, usize>,
    overrides: Vec<(ResourceId, Vec<String>)>,
    resources: usize,
    bytes: u64,
    metadata_errors: Vec<(ResourceId, String)>,
}

type SharedReport = Arc<Mutex<InventoryReport>>;

fn everything(_: &ResourceId) -> bool {
    true
}

struct NamespaceCensus {
    report: SharedReport,
}

impl PreparedListener for NamespaceCensus {
    type Output = BTreeMap<String, usize>;

    fn name(&self) -> &str {
        "namespaces"
    }

    fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError> {
        let mut counts = BTreeMap::new();
        for id in state.resources().list_resources("", &everything)?.keys() {
            *counts.entry(id.namespace().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn apply(&self, output: Self::Output, _state: &SharedState) -> Result<(), ReloadError> {
        self.report.lock().namespaces = output;
        Ok(())
    }
}

struct OverrideIndex {
    report: SharedReport,
}

impl PreparedListener for OverrideIndex {
    type Output = Vec<(ResourceId, Vec<String>)>;

    fn name(&self) -> &str {
        "overrides"
    }

    fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError> {
        let stacks = state.resources().list_resource_stacks("", &everything)?;
        Ok(stacks
            .into_iter()
            .filter(|(_, layers)| layers.len() > 1)
            .map(|(id, layers)| {
                let sources = layers.iter().map(|r| r.source_id().to_string()).collect();
                (id, sources)
            })
            .collect())
    }

    fn apply(&self, output: Self::Output, _state: &SharedState) -> Result<(), ReloadError> {
        self.report.lock().overrides = output;
        Ok(())
    }
}

struct ByteTotals {
    report: SharedReport,
}

impl PreparedListener for ByteTotals {
    type Output = (usize, u64);

    fn name(&self) -> &str {
        "bytes"
    }

    fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError> {
        let listed = state.resources().list_resources("", &everything)?;
        let mut bytes = 0u64;
        for resource in listed.values() {
            bytes += resource.read_to_vec()?.len() as u64;
        }
        Ok((listed.len(), bytes))
    }

    fn apply(&self, output: Self::Output, _state: &SharedState) -> Result<(), ReloadError> {
        let (resources, bytes) = output;
        let mut report = self.report.lock();
        report.resources = resources;
        report.bytes = bytes;
        Ok(())
    }
}

struct MetadataCheck {
    report: SharedReport,
}

impl PreparedListener for MetadataCheck {
    type Output = Vec<(ResourceId, String)>;

    fn name(&self) -> &str {
        "metadata"
    }

    fn prepare(&self, state: &SharedState) -> Result<Self::Output, ReloadError> {
        let listed = state.resources().list_resources("", &everything)?;
        Ok(listed
            .iter()
            .filter_map(|(id, resource)| {
                resource
                    .metadata()
                    .err()
                    .map(|e| (id.clone(), e.to_string()))
            })
            .collect())
    }

    fn apply(&self, output: Self::Output, _state: &SharedState) -> Result<(), ReloadError> {
        self.report.lock().metadata_errors = output;
        Ok(())
    }
}

fn inventory_listeners(report: &SharedReport) -> Vec<Arc<dyn ReloadListener>> {
    vec![
        Prepared::shared(NamespaceCensus {
            report: Arc::clone(report),
        }),
        Prepared::shared(OverrideIndex {
            report: Arc::clone(report),
        }),
        Prepared::shared(ByteTotals {
            report: Arc::clone(report),
        }),
        Prepared::shared(MetadataCheck {
            report: Arc::clone(report),
        }),
    ]
}

// ===== Command =====

/// Run the reload command.
pub fn run(runner: &CliRunner, args: ReloadArgs) -> Result<(), CliError> {
    let mut config = runner.config().reload.clone();
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(swap) = args.swap {
        config.swap = swap;
    }
    if args.profile {
        config.profile = ProfileMode::Always;
    }

    let sources = runner.sources()?;
    let report: SharedReport = Arc::default();

    let directory = ResourceDirectory::new(runner.kind(), config.clone())
        .with_observer(Arc::new(TracingObserver));
    for listener in inventory_listeners(&report) {
        directory.register_reload_listener(listener);
    }

    let pool = WorkerPool::new(config.workers)?;
    let (main, mut queue) = main_thread();
    let bar = progress_bar(args.no_progress);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    println!(
        "Reloading {} packs ({}, {} workers, swap {})",
        sources.len(),
        runner.kind(),
        pool.threads(),
        config.swap
    );

    let outcome = runtime.block_on(async {
        let handle = directory.begin_reload(
            Arc::new(pool),
            Arc::new(main),
            async { Ok::<(), Infallible>(()) },
            sources,
        )?;

        let ticker = {
            let handle = handle.clone();
            let bar = bar.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PROGRESS_TICK);
                loop {
                    interval.tick().await;
                    bar.set_position(progress_position(&handle));
                }
            })
        };

        let result = queue.run_until(handle.done()).await;
        ticker.abort();
        result?;
        Ok::<ReloadHandle, CliError>(handle)
    });

    bar.finish_and_clear();
    let handle = outcome?;

    print_report(&report.lock());
    if let Some(summary) = handle.summary() {
        print_summary(&summary);
    }

    directory.close();
    Ok(())
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(PROGRESS_STEPS);
    let template = "  [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}%";
    if let Ok(progress_style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(progress_style.progress_chars("#>-"));
    }
    bar
}

fn progress_position(handle: &ReloadHandle) -> u64 {
    (handle.progress() * PROGRESS_STEPS as f32) as u64
}

fn print_report(report: &InventoryReport) {
    println!();
    println!("{}", style("Inventory").bold());
    println!("─────────");
    println!(
        "  Resources: {} ({})",
        report.resources,
        format_bytes(report.bytes)
    );
    println!("  Namespaces:");
    for (namespace, count) in &report.namespaces {
        println!("    {:<24} {:>6}", namespace, count);
    }

    println!("  Overridden: {}", report.overrides.len());
    for (id, sources) in report.overrides.iter().take(MAX_OVERRIDES_SHOWN) {
        println!("    {}  {}", id, style(sources.join(" < ")).dim());
    }
    if report.overrides.len() > MAX_OVERRIDES_SHOWN {
        println!("    ... and {} more", report.overrides.len() - MAX_OVERRIDES_SHOWN);
    }

    if !report.metadata_errors.is_empty() {
        println!(
            "  {} {}",
            style("Invalid metadata:").yellow(),
            report.metadata_errors.len()
        );
        for (id, error) in &report.metadata_errors {
            println!("    {}: {}", id, error);
        }
    }
}

fn print_summary(summary: &ReloadSummary) {
    println!();
    println!("{}", style("Reload profile").bold());
    println!("──────────────");
    println!(
        "  {:<12} {:>10} {:>6} {:>10} {:>6}",
        "listener", "prepare", "jobs", "apply", "jobs"
    );
    for timing in &summary.listeners {
        println!(
            "  {:<12} {:>8.1}ms {:>6} {:>8.1}ms {:>6}",
            timing.name,
            millis(timing.prepare),
            timing.prepare_tasks,
            millis(timing.apply),
            timing.apply_tasks
        );
    }
    println!(
        "  Total: {:.1}ms, main thread blocked: {:.1}ms",
        millis(summary.total),
        millis(summary.blocking)
    );
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
