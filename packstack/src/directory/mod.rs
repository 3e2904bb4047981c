//! The live resource directory.
//!
//! # Overview
//!
//! [`ResourceDirectory`] owns the current [`AggregateResolver`] and the
//! persistent list of reload listeners. Queries always go to whichever
//! resolver is current; [`ResourceDirectory::begin_reload`] builds a new
//! resolver from a fresh source list and runs every registered listener
//! against it.
//!
//! # Swap timing
//!
//! ```text
//! BeforeReload:  close old ──► build new ──► swap ──► start reload ──► done
//!
//! OnSuccess:     build new ──► start reload ──► done ─┬─ Ok  ──► swap, close old
//!                                                     └─ Err ──► close new
//! ```
//!
//! With [`SwapTiming::BeforeReload`] queries see the new resources while
//! listeners are still rebuilding, and a failed reload leaves the new
//! resolver in place. A failed reload should be treated as fatal for the
//! session.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::FutureExt;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{ReloadConfig, SwapTiming};
use crate::observer::{NoopObserver, ReloadObserver};
use crate::reload::{
    Executor, ReloadError, ReloadHandle, ReloadInstance, ReloadListener, StageFuture,
};
use crate::resolver::{AggregateResolver, ListFilter, ResourceManager};
use crate::resource::{Resource, ResourceError, ResourceId};
use crate::source::{ContentSource, PackKind};

/// Holds one resolver at a time and reloads it on demand.
pub struct ResourceDirectory {
    kind: PackKind,
    config: ReloadConfig,
    current: Arc<RwLock<Arc<AggregateResolver>>>,
    generation: Arc<AtomicU64>,
    listeners: RwLock<Vec<Arc<dyn ReloadListener>>>,
    observer: Arc<dyn ReloadObserver>,
}

impl ResourceDirectory {
    /// An empty directory for `kind`.
    pub fn new(kind: PackKind, config: ReloadConfig) -> Self {
        Self {
            kind,
            config,
            current: Arc::new(RwLock::new(Arc::new(AggregateResolver::empty(kind)))),
            generation: Arc::new(AtomicU64::new(0)),
            listeners: RwLock::new(Vec::new()),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report reloads to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ReloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn kind(&self) -> PackKind {
        self.kind
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    /// Append `listener`; it takes part in every later reload.
    pub fn register_reload_listener(&self, listener: Arc<dyn ReloadListener>) {
        debug!(listener = listener.name(), "Registered reload listener");
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// The resolver queries currently go to.
    pub fn current(&self) -> Arc<AggregateResolver> {
        Arc::clone(&self.current.read())
    }

    /// Build a resolver over `sources` (lowest priority first) and reload
    /// every registered listener against it.
    ///
    /// No listener starts preparing before `ready` completes. Must be called
    /// inside a Tokio runtime; nothing blocks.
    pub fn begin_reload<G, E>(
        &self,
        background: Arc<dyn Executor>,
        main: Arc<dyn Executor>,
        ready: G,
        sources: Vec<Arc<dyn ContentSource>>,
    ) -> Result<ReloadHandle, ReloadError>
    where
        G: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        // Fail before touching the current resolver.
        Handle::try_current().map_err(|_| ReloadError::NoRuntime)?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let listeners = self.listeners.read().clone();
        info!(
            kind = %self.kind,
            sources = sources.len(),
            listeners = listeners.len(),
            generation,
            swap = %self.config.swap,
            "Beginning reload"
        );

        if self.config.swap == SwapTiming::BeforeReload {
            self.current.read().close();
        }

        let resolver = Arc::new(AggregateResolver::new(self.kind, sources));

        if self.config.swap == SwapTiming::BeforeReload {
            *self.current.write() = Arc::clone(&resolver);
        }

        let resources: Arc<dyn ResourceManager> = resolver.clone();
        let handle = ReloadInstance::new(resources, listeners, background, main)
            .with_gate(ready)
            .with_observer(Arc::clone(&self.observer))
            .profiled(self.config.profile.is_enabled())
            .start();

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                if self.config.swap == SwapTiming::OnSuccess {
                    resolver.close();
                }
                return Err(e);
            }
        };

        match self.config.swap {
            SwapTiming::BeforeReload => Ok(handle),
            SwapTiming::OnSuccess => Ok(self.swap_on_success(handle, resolver, generation)),
        }
    }

    fn swap_on_success(
        &self,
        handle: ReloadHandle,
        resolver: Arc<AggregateResolver>,
        generation: u64,
    ) -> ReloadHandle {
        let current = Arc::clone(&self.current);
        let latest = Arc::clone(&self.generation);
        let done: StageFuture = handle
            .done()
            .map(move |result| {
                match &result {
                    Ok(()) if latest.load(Ordering::Acquire) == generation => {
                        let old = std::mem::replace(&mut *current.write(), resolver);
                        old.close();
                        debug!(generation, "Swapped to reloaded resolver");
                    }
                    Ok(()) => {
                        warn!(generation, "Reload superseded, discarding its resolver");
                        resolver.close();
                    }
                    Err(_) => {
                        debug!(generation, "Reload failed, keeping previous resolver");
                        resolver.close();
                    }
                }
                result
            })
            .boxed()
            .shared();

        // Drive the swap even if the caller never polls the handle.
        tokio::spawn(done.clone());
        handle.with_done(done)
    }

    /// Close the current resolver.
    pub fn close(&self) {
        self.current.read().close();
    }
}

impl ResourceManager for ResourceDirectory {
    fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.current().resource(id)
    }

    fn resource_stack(&self, id: &ResourceId) -> Vec<Resource> {
        self.current().resource_stack(id)
    }

    fn list_resources(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Resource>, ResourceError> {
        self.current().list_resources(directory, filter)
    }

    fn list_resource_stacks(
        &self,
        directory: &str,
        filter: &ListFilter<'_>,
    ) -> Result<BTreeMap<ResourceId, Vec<Resource>>, ResourceError> {
        self.current().list_resource_stacks(directory, filter)
    }

    fn namespaces(&self) -> BTreeSet<String> {
        self.current().namespaces()
    }

    fn list_sources(&self) -> Vec<Arc<dyn ContentSource>> {
        self.current().list_sources()
    }
}

impl std::fmt::Debug for ResourceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDirectory")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("current", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
