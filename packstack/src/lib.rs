//! packstack - layered content packs with live, two-phase reloads.
//!
//! An application assembles its runtime assets from an ordered stack of
//! content sources ("packs"). Later packs override earlier ones and may hide
//! resources beneath them through filter rules. The whole asset set can be
//! reloaded at runtime: independent subsystems ("reload listeners") prepare
//! their derived state in parallel on a background pool, then apply it on a
//! single main-thread executor in a fixed order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │ ContentSource│──►│ NamespaceResolver │──►│ AggregateResolver│
//! │  (per pack)  │   │  (per namespace)  │   │  (per reload)    │
//! └──────────────┘   └───────────────────┘   └────────┬─────────┘
//!                                                     │
//!                                                     ▼
//!                    ┌───────────────────┐   ┌──────────────────┐
//!                    │  ReloadInstance   │◄──│ResourceDirectory │
//!                    │ prepare ║ apply   │   │ (live, swapped)  │
//!                    └───────────────────┘   └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use packstack::config::ReloadConfig;
//! use packstack::directory::ResourceDirectory;
//! use packstack::reload::{main_thread, Prepared, WorkerPool};
//! use packstack::source::{MemorySource, PackKind};
//!
//! let base = MemorySource::builder("base")
//!     .text(PackKind::ClientResources, "a:x", "1")
//!     .build()?;
//!
//! let directory = ResourceDirectory::new(PackKind::ClientResources, ReloadConfig::default());
//! directory.register_reload_listener(Prepared::shared(LanguageTable::default()));
//!
//! let (main, mut queue) = main_thread();
//! let pool = Arc::new(WorkerPool::new(0)?);
//! let handle = directory.begin_reload(pool, Arc::new(main), ready(), vec![base.into_shared()])?;
//! queue.run_until(handle.done()).await?;
//! ```

pub mod config;
pub mod directory;
pub mod logging;
pub mod observer;
pub mod reload;
pub mod resolver;
pub mod resource;
pub mod source;

/// Crate version, used in log headers and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
